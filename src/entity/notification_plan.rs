use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::NotificationScope;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_plan")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub scope: NotificationScope,
    pub notifications_count: i32,
    pub price: f64,
    pub discount_percentage: f64,
    pub features: String,
    pub is_popular: bool,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn discounted_price(&self) -> f64 {
        super::featured_plan::discounted_price(self.price, self.discount_percentage)
    }

    pub fn price_per_notification(&self) -> f64 {
        if self.notifications_count <= 0 {
            return 0.0;
        }
        self.discounted_price() / self.notifications_count as f64
    }
}
