use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::PromotionStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deal_of_day_request")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub merchant_id: i64,
    pub offer_id: i64,
    pub duration_days: i32,
    pub price_per_day: f64,
    pub total_price: f64,
    pub status: PromotionStatus,
    pub receipt: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_number: Option<String>,
    pub start_date: Option<DateTime>,
    pub end_date: Option<DateTime>,
    pub views_count: i64,
    pub clicks_count: i64,
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
}

impl Related<super::offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 当前时间是否处于投放期内
    pub fn is_running(&self, now: DateTime) -> bool {
        self.status == PromotionStatus::Active
            && self.start_date.is_some_and(|start| start <= now)
            && self.end_date.is_some_and(|end| now <= end)
    }
}
