use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 配置键名
    pub key: String,
    /// 配置值（JSON格式）
    pub value: String,
    pub description: String,
    /// 配置类型：number, string, boolean
    pub value_type: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// 配置键常量
pub mod config_keys {
    /// 今日特惠功能开关
    pub const DEAL_OF_DAY_ACTIVE: &str = "deal_of_day_active";
    /// 今日特惠模式：auto 或 paid
    pub const DEAL_OF_DAY_MODE: &str = "deal_of_day_mode";
    /// 自动模式下的最低折扣（%）
    pub const DEAL_OF_DAY_MIN_DISCOUNT: &str = "deal_of_day_min_discount";
    /// 付费模式每日价格
    pub const DEAL_OF_DAY_PRICE_PER_DAY: &str = "deal_of_day_price_per_day";
    /// 单次申请最长天数
    pub const DEAL_OF_DAY_MAX_DAYS: &str = "deal_of_day_max_days";

    pub const ONLINE_USERS_ENABLED: &str = "online_users_enabled";
    pub const ONLINE_USERS_DISPLAY_MODE: &str = "online_users_display_mode";
    pub const ONLINE_USERS_POSITION: &str = "online_users_position";
    pub const ONLINE_USERS_COLOR_SCHEME: &str = "online_users_color_scheme";
    pub const ONLINE_USERS_CUSTOM_COLOR: &str = "online_users_custom_color";
    pub const ONLINE_USERS_OPACITY: &str = "online_users_opacity";
    pub const ONLINE_USERS_SHOW_ACTIVITY_STATUS: &str = "online_users_show_activity_status";
    pub const ONLINE_USERS_SHOW_MINI_CHART: &str = "online_users_show_mini_chart";
    pub const ONLINE_USERS_SHOW_PULSE_ANIMATION: &str = "online_users_show_pulse_animation";
    pub const ONLINE_USERS_AUTO_HIDE_ON_SCROLL: &str = "online_users_auto_hide_on_scroll";
    pub const ONLINE_USERS_HOMEPAGE_ONLY: &str = "online_users_homepage_only";
    pub const ONLINE_USERS_UPDATE_INTERVAL: &str = "online_users_update_interval";
    pub const ONLINE_USERS_MIN: &str = "online_users_min";
    pub const ONLINE_USERS_MAX: &str = "online_users_max";
    pub const ONLINE_USERS_PEAK_START: &str = "online_users_peak_start";
    pub const ONLINE_USERS_PEAK_END: &str = "online_users_peak_end";
    pub const ONLINE_USERS_SOUND_EFFECTS: &str = "online_users_sound_effects";
    pub const ONLINE_USERS_VIBRATION: &str = "online_users_vibration";
}
