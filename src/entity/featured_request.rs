use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::PromotionStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "featured_request")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub merchant_id: i64,
    pub offer_id: i64,
    pub plan_id: i64,
    pub status: PromotionStatus,
    /// 提交时按套餐折后价锁定
    pub amount: f64,
    pub receipt: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_number: Option<String>,
    pub start_date: Option<DateTime>,
    pub end_date: Option<DateTime>,
    pub views_count: i64,
    pub clicks_count: i64,
    pub favorites_count: i64,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<DateTime>,
    pub created_at: DateTime,
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
    #[sea_orm(
        belongs_to = "super::offer::Entity",
        from = "Column::OfferId",
        to = "super::offer::Column::Id",
        on_delete = "Cascade"
    )]
    Offer,
    #[sea_orm(
        belongs_to = "super::featured_plan::Entity",
        from = "Column::PlanId",
        to = "super::featured_plan::Column::Id"
    )]
    Plan,
}

impl Related<super::offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl Related<super::featured_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
