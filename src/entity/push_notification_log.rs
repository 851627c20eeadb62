use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::NotificationScope;

/// 商家推送记录
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "push_notification_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub merchant_id: i64,
    pub offer_id: Option<i64>,
    pub scope: NotificationScope,
    pub title: String,
    pub body: String,
    pub recipients_count: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub sent_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::merchant::Entity",
        from = "Column::MerchantId",
        to = "super::merchant::Column::Id",
        on_delete = "Cascade"
    )]
    Merchant,
}

impl ActiveModelBehavior for ActiveModel {}
