use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::UserType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    /// 仅使用 Google 登录的账号没有密码
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub user_type: UserType,
    pub city_id: Option<i64>,
    /// 用户当前浏览的城市，城市范围推送按此字段筛选
    pub selected_city_id: Option<i64>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::merchant::Entity")]
    Merchant,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 展示名称：没有填写全名时取邮箱前缀
    pub fn display_name(&self) -> String {
        if !self.full_name.trim().is_empty() {
            return self.full_name.clone();
        }
        self.email.split('@').next().unwrap_or_default().to_string()
    }
}
