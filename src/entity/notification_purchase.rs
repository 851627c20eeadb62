use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::PurchaseStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_purchase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub merchant_id: i64,
    pub plan_id: i64,
    pub status: PurchaseStatus,
    pub amount: f64,
    pub receipt: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_number: Option<String>,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<DateTime>,
    pub created_at: DateTime,
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
    #[sea_orm(
        belongs_to = "super::notification_plan::Entity",
        from = "Column::PlanId",
        to = "super::notification_plan::Column::Id"
    )]
    Plan,
}

impl Related<super::notification_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
