use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "featured_plan")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub duration_days: i32,
    pub price: f64,
    pub estimated_views: i32,
    /// 每行一个卖点
    pub features: String,
    pub discount_percentage: f64,
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
        discounted_price(self.price, self.discount_percentage)
    }

    pub fn feature_list(&self) -> Vec<String> {
        feature_list(&self.features)
    }
}

pub fn discounted_price(price: f64, discount_percentage: f64) -> f64 {
    if discount_percentage <= 0.0 {
        return price;
    }
    price - price * discount_percentage / 100.0
}

pub fn feature_list(features: &str) -> Vec<String> {
    features
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
