use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::ApprovalStatus;

/// 用户提交的入驻申请，审核通过后生成或更新商家
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "merchant_request")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub business_name: String,
    pub business_type_id: Option<i64>,
    pub governorate_id: i64,
    pub city_id: i64,
    pub phone: String,
    pub address: Option<String>,
    pub description: Option<String>,
    pub status: ApprovalStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<DateTime>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
