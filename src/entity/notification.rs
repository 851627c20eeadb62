use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::NotificationType;

/// 管理员群发记录
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub body: String,
    pub notification_type: NotificationType,
    /// all 或 users
    pub target: String,
    pub recipients_count: i32,
    pub success_count: i32,
    pub sent_by: Option<i64>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
