use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::entity::system_config::config_keys;
use crate::entity::{system_config, SystemConfig};

/// 配置缓存管理器
#[derive(Clone)]
pub struct ConfigManager {
    db: DatabaseConnection,
    cache: Arc<RwLock<HashMap<String, ConfigValue>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Number(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl ConfigValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            ConfigValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Number(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// 今日特惠的选取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DealMode {
    /// 按折扣自动挑选
    Auto,
    /// 只展示付费申请
    Paid,
}

#[derive(Debug, Clone, Serialize)]
pub struct DealOfDaySettings {
    pub is_active: bool,
    pub mode: DealMode,
    pub min_discount: i64,
    pub price_per_day: f64,
    pub max_days_per_merchant: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnlineUsersSettings {
    pub enabled: bool,
    pub display_mode: String,
    pub position: String,
    pub color_scheme: String,
    pub custom_color: Option<String>,
    pub opacity: f64,
    pub show_activity_status: bool,
    pub show_mini_chart: bool,
    pub show_pulse_animation: bool,
    pub auto_hide_on_scroll: bool,
    pub show_only_on_homepage: bool,
    pub update_interval: i64,
    pub min_users: i64,
    pub max_users: i64,
    pub peak_hours_start: i64,
    pub peak_hours_end: i64,
    pub sound_effects: bool,
    pub vibration_feedback: bool,
}

impl ConfigManager {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 从数据库加载所有配置到缓存
    pub async fn load_from_db(&self) -> anyhow::Result<()> {
        let configs = SystemConfig::find().all(&self.db).await?;

        let mut cache = self.cache.write().await;
        cache.clear();
        for config in configs {
            let value = parse_value(&config.value, &config.value_type);
            cache.insert(config.key.clone(), value);
        }

        info!("✅ 已加载 {} 个系统配置项", cache.len());
        Ok(())
    }

    /// 获取配置值
    pub async fn get(&self, key: &str) -> Option<ConfigValue> {
        let cache = self.cache.read().await;
        cache.get(key).cloned()
    }

    /// 获取数值配置（带默认值）
    pub async fn get_number(&self, key: &str, default: i64) -> i64 {
        self.get(key).await.and_then(|v| v.as_i64()).unwrap_or(default)
    }

    /// 获取浮点配置（带默认值）
    pub async fn get_float(&self, key: &str, default: f64) -> f64 {
        self.get(key).await.and_then(|v| v.as_f64()).unwrap_or(default)
    }

    /// 获取字符串配置（带默认值）
    pub async fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .await
            .and_then(|v| v.as_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// 获取布尔配置（带默认值）
    pub async fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).await.and_then(|v| v.as_bool()).unwrap_or(default)
    }

    /// 更新配置值
    pub async fn set(&self, key: &str, value: ConfigValue) -> anyhow::Result<()> {
        let value_str = match &value {
            ConfigValue::Number(n) => n.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::String(s) => serde_json::to_string(s)?,
            ConfigValue::Boolean(b) => b.to_string(),
        };

        let config = SystemConfig::find()
            .filter(system_config::Column::Key.eq(key))
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("配置项不存在: {}", key))?;

        let mut active_model: system_config::ActiveModel = config.into();
        active_model.value = Set(value_str);
        active_model.updated_at = Set(chrono::Utc::now().naive_utc());
        active_model.update(&self.db).await?;

        let mut cache = self.cache.write().await;
        cache.insert(key.to_string(), value);
        Ok(())
    }

    /// 重新加载配置（用于配置更新后刷新）
    pub async fn reload(&self) -> anyhow::Result<()> {
        self.load_from_db().await
    }

    pub async fn deal_of_day_settings(&self) -> DealOfDaySettings {
        let mode = match self.get_string(config_keys::DEAL_OF_DAY_MODE, "auto").await.as_str() {
            "paid" => DealMode::Paid,
            _ => DealMode::Auto,
        };

        DealOfDaySettings {
            is_active: self.get_bool(config_keys::DEAL_OF_DAY_ACTIVE, true).await,
            mode,
            min_discount: self.get_number(config_keys::DEAL_OF_DAY_MIN_DISCOUNT, 25).await,
            price_per_day: self.get_float(config_keys::DEAL_OF_DAY_PRICE_PER_DAY, 1000.0).await,
            max_days_per_merchant: self.get_number(config_keys::DEAL_OF_DAY_MAX_DAYS, 7).await as i32,
        }
    }

    pub async fn online_users_settings(&self) -> OnlineUsersSettings {
        let custom_color = self.get_string(config_keys::ONLINE_USERS_CUSTOM_COLOR, "").await;

        OnlineUsersSettings {
            enabled: self.get_bool(config_keys::ONLINE_USERS_ENABLED, true).await,
            display_mode: self.get_string(config_keys::ONLINE_USERS_DISPLAY_MODE, "full").await,
            position: self.get_string(config_keys::ONLINE_USERS_POSITION, "bottom").await,
            color_scheme: self.get_string(config_keys::ONLINE_USERS_COLOR_SCHEME, "dynamic").await,
            custom_color: (!custom_color.is_empty()).then_some(custom_color),
            opacity: self.get_float(config_keys::ONLINE_USERS_OPACITY, 1.0).await,
            show_activity_status: self.get_bool(config_keys::ONLINE_USERS_SHOW_ACTIVITY_STATUS, true).await,
            show_mini_chart: self.get_bool(config_keys::ONLINE_USERS_SHOW_MINI_CHART, true).await,
            show_pulse_animation: self.get_bool(config_keys::ONLINE_USERS_SHOW_PULSE_ANIMATION, true).await,
            auto_hide_on_scroll: self.get_bool(config_keys::ONLINE_USERS_AUTO_HIDE_ON_SCROLL, false).await,
            show_only_on_homepage: self.get_bool(config_keys::ONLINE_USERS_HOMEPAGE_ONLY, false).await,
            update_interval: self.get_number(config_keys::ONLINE_USERS_UPDATE_INTERVAL, 10).await,
            min_users: self.get_number(config_keys::ONLINE_USERS_MIN, 25).await,
            max_users: self.get_number(config_keys::ONLINE_USERS_MAX, 450).await,
            peak_hours_start: self.get_number(config_keys::ONLINE_USERS_PEAK_START, 18).await,
            peak_hours_end: self.get_number(config_keys::ONLINE_USERS_PEAK_END, 23).await,
            sound_effects: self.get_bool(config_keys::ONLINE_USERS_SOUND_EFFECTS, false).await,
            vibration_feedback: self.get_bool(config_keys::ONLINE_USERS_VIBRATION, false).await,
        }
    }

    /// 校验单个配置值，返回阿拉伯语错误提示
    pub async fn validate(&self, key: &str, value: &ConfigValue) -> Result<(), String> {
        self.validate_all(&[(key.to_string(), value.clone())]).await
    }

    /// 把待写入的值叠加到当前缓存后逐项校验，相互约束的配置（人数上下限）按写入后的状态比较
    pub async fn validate_all(&self, entries: &[(String, ConfigValue)]) -> Result<(), String> {
        let mut view = self.cache.read().await.clone();
        for (key, value) in entries {
            view.insert(key.clone(), value.clone());
        }

        for (key, value) in entries {
            check_value(&view, key, value)?;
        }
        Ok(())
    }
}

fn check_value(view: &HashMap<String, ConfigValue>, key: &str, value: &ConfigValue) -> Result<(), String> {
    let number = value.as_f64();
    let in_range = |min: f64, max: f64| number.is_some_and(|n| n >= min && n <= max);
    let view_number = |k: &str, default: i64| view.get(k).and_then(|v| v.as_i64()).unwrap_or(default) as f64;

    let ok = match key {
        config_keys::ONLINE_USERS_OPACITY => in_range(0.5, 1.0),
        config_keys::ONLINE_USERS_UPDATE_INTERVAL => in_range(5.0, 60.0),
        config_keys::ONLINE_USERS_PEAK_START | config_keys::ONLINE_USERS_PEAK_END => in_range(0.0, 23.0),
        config_keys::ONLINE_USERS_MIN => in_range(1.0, view_number(config_keys::ONLINE_USERS_MAX, 450)),
        config_keys::ONLINE_USERS_MAX => {
            in_range(view_number(config_keys::ONLINE_USERS_MIN, 25).max(10.0), f64::MAX)
        }
        config_keys::DEAL_OF_DAY_MIN_DISCOUNT => in_range(0.0, 100.0),
        config_keys::DEAL_OF_DAY_PRICE_PER_DAY => in_range(0.0, f64::MAX),
        config_keys::DEAL_OF_DAY_MAX_DAYS => in_range(1.0, 7.0),
        config_keys::DEAL_OF_DAY_MODE => {
            matches!(value.as_string().as_deref(), Some("auto") | Some("paid"))
        }
        _ => true,
    };

    if ok {
        Ok(())
    } else {
        Err(format!("قيمة غير صالحة للإعداد: {}", key))
    }
}

/// 解析配置值
fn parse_value(value_str: &str, value_type: &str) -> ConfigValue {
    match value_type {
        "number" => {
            if let Ok(n) = value_str.parse::<i64>() {
                ConfigValue::Number(n)
            } else if let Ok(f) = value_str.parse::<f64>() {
                ConfigValue::Float(f)
            } else {
                warn!("无法解析数值配置: {}", value_str);
                ConfigValue::Number(0)
            }
        }
        "boolean" => ConfigValue::Boolean(value_str.parse::<bool>().unwrap_or(false)),
        "string" => match serde_json::from_str::<String>(value_str) {
            Ok(s) => ConfigValue::String(s),
            Err(_) => ConfigValue::String(value_str.to_string()),
        },
        _ => ConfigValue::String(value_str.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("25", "number"), ConfigValue::Number(25));
        assert_eq!(parse_value("0.8", "number"), ConfigValue::Float(0.8));
        assert_eq!(parse_value("true", "boolean"), ConfigValue::Boolean(true));
        assert_eq!(parse_value("\"paid\"", "string"), ConfigValue::String("paid".into()));
        assert_eq!(parse_value("raw", "string"), ConfigValue::String("raw".into()));
    }

    #[tokio::test]
    async fn test_seeded_settings() {
        let db = setup_db().await;
        let manager = ConfigManager::new(db);
        manager.load_from_db().await.unwrap();

        let deal = manager.deal_of_day_settings().await;
        assert!(deal.is_active);
        assert_eq!(deal.mode, DealMode::Auto);
        assert_eq!(deal.min_discount, 25);
        assert_eq!(deal.price_per_day, 1000.0);
        assert_eq!(deal.max_days_per_merchant, 7);

        let online = manager.online_users_settings().await;
        assert_eq!(online.update_interval, 10);
        assert_eq!(online.min_users, 25);
        assert_eq!(online.max_users, 450);
        assert_eq!(online.opacity, 1.0);
        assert_eq!(online.custom_color, None);
    }

    #[tokio::test]
    async fn test_set_persists_and_updates_cache() {
        let db = setup_db().await;
        let manager = ConfigManager::new(db.clone());
        manager.load_from_db().await.unwrap();

        manager
            .set(config_keys::DEAL_OF_DAY_MODE, ConfigValue::String("paid".into()))
            .await
            .unwrap();
        assert_eq!(manager.deal_of_day_settings().await.mode, DealMode::Paid);

        let fresh = ConfigManager::new(db);
        fresh.load_from_db().await.unwrap();
        assert_eq!(fresh.deal_of_day_settings().await.mode, DealMode::Paid);

        assert!(manager.set("missing_key", ConfigValue::Number(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_validate_ranges() {
        let db = setup_db().await;
        let manager = ConfigManager::new(db);
        manager.load_from_db().await.unwrap();

        assert!(manager.validate(config_keys::ONLINE_USERS_OPACITY, &ConfigValue::Float(0.4)).await.is_err());
        assert!(manager.validate(config_keys::ONLINE_USERS_OPACITY, &ConfigValue::Float(0.7)).await.is_ok());
        assert!(manager.validate(config_keys::ONLINE_USERS_UPDATE_INTERVAL, &ConfigValue::Number(61)).await.is_err());
        assert!(manager.validate(config_keys::ONLINE_USERS_MIN, &ConfigValue::Number(500)).await.is_err());
        assert!(manager.validate(config_keys::DEAL_OF_DAY_MODE, &ConfigValue::String("weekly".into())).await.is_err());
        assert!(manager.validate("unrelated", &ConfigValue::Number(-1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_all_checks_min_max_after_batch() {
        let db = setup_db().await;
        let manager = ConfigManager::new(db);
        manager.load_from_db().await.unwrap();

        let inverted = vec![
            (config_keys::ONLINE_USERS_MIN.to_string(), ConfigValue::Number(400)),
            (config_keys::ONLINE_USERS_MAX.to_string(), ConfigValue::Number(100)),
        ];
        assert!(manager.validate_all(&inverted).await.is_err());

        // 单独提交 500 会超过当前上限 450，与新上限一起提交则合法
        assert!(manager.validate(config_keys::ONLINE_USERS_MIN, &ConfigValue::Number(500)).await.is_err());
        let raised = vec![
            (config_keys::ONLINE_USERS_MIN.to_string(), ConfigValue::Number(500)),
            (config_keys::ONLINE_USERS_MAX.to_string(), ConfigValue::Number(600)),
        ];
        assert!(manager.validate_all(&raised).await.is_ok());
    }
}
