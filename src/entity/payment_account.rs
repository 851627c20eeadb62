use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 商家付款用的收款账户
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_account")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub bank: String,
    pub account_name: String,
    pub account_number: String,
    pub is_active: bool,
    pub display_order: i32,
    pub notes: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
