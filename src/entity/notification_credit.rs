use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::NotificationScope;

/// 商家剩余的推送条数
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_credit")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub merchant_id: i64,
    pub city_notifications: i32,
    pub all_notifications: i32,
    pub total_sent: i32,
    pub updated_at: DateTime,
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

impl Model {
    pub fn available(&self, scope: NotificationScope) -> i32 {
        match scope {
            NotificationScope::City => self.city_notifications,
            NotificationScope::All => self.all_notifications,
        }
    }
}
