use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Currency, Region};

/// 外币兑也门里亚尔的汇率，南北地区分别定价
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exchange_rate")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub currency: Currency,
    pub region: Region,
    pub rate: f64,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
