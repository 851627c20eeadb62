use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Currency, OfferStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offer")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub merchant_id: i64,
    pub title: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub city_id: Option<i64>,
    pub price_before: f64,
    pub price_after: f64,
    pub currency: Currency,
    pub end_at: Option<DateTime>,
    pub status: OfferStatus,
    pub is_featured: bool,
    pub featured_until: Option<DateTime>,
    pub is_deal_of_day: bool,
    pub deal_of_day_until: Option<DateTime>,
    pub views_count: i64,
    pub delivery_enabled: bool,
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
    #[sea_orm(has_many = "super::offer_image::Entity")]
    Images,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl Related<super::offer_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 折扣百分比，四舍五入到整数
    pub fn saving_percentage(&self) -> i64 {
        saving_percentage(self.price_before, self.price_after)
    }

    pub fn is_expired(&self, now: DateTime) -> bool {
        self.end_at.is_some_and(|end_at| end_at < now)
    }
}

pub fn saving_percentage(price_before: f64, price_after: f64) -> i64 {
    if price_before <= 0.0 {
        return 0;
    }
    ((price_before - price_after) / price_before * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saving_percentage() {
        assert_eq!(saving_percentage(1000.0, 750.0), 25);
        assert_eq!(saving_percentage(300.0, 200.0), 33);
        assert_eq!(saving_percentage(3.0, 1.0), 67);
        assert_eq!(saving_percentage(100.0, 100.0), 0);
        assert_eq!(saving_percentage(0.0, 50.0), 0);
    }
}
