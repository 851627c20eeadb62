use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "city")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub governorate_id: i64,
    pub name: String,
    pub name_en: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::governorate::Entity",
        from = "Column::GovernorateId",
        to = "super::governorate::Column::Id",
        on_delete = "Cascade"
    )]
    Governorate,
}

impl Related<super::governorate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Governorate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}
