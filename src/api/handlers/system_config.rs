use axum::{extract::Extension, response::Json};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::{
    config_manager::{ConfigValue, OnlineUsersSettings},
    entity::{system_config, SystemConfig},
    error::{AppError, AppResult},
    middleware::{require_admin, AuthUser},
    AppState,
};

use super::{respond, respond_with, ApiResult};

#[derive(Debug, Serialize)]
pub struct ConfigListResponse {
    pub configs: Vec<ConfigItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigItem {
    pub id: i64,
    pub key: String,
    pub value: serde_json::Value,
    pub description: String,
    #[serde(rename = "valueType")]
    pub value_type: String,
}

impl From<system_config::Model> for ConfigItem {
    fn from(c: system_config::Model) -> Self {
        let value = serde_json::from_str(&c.value).unwrap_or(serde_json::Value::Null);
        ConfigItem {
            id: c.id,
            key: c.key,
            value,
            description: c.description,
            value_type: c.value_type,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateConfigRequest {
    pub configs: Vec<UpdateConfigRequest>,
}

/// 按配置声明的类型把 JSON 值转换为 ConfigValue
fn convert_value(value_type: &str, value: &serde_json::Value) -> AppResult<ConfigValue> {
    let converted = match value_type {
        "number" => value
            .as_i64()
            .map(ConfigValue::Number)
            .or_else(|| value.as_f64().map(ConfigValue::Float)),
        "boolean" => value.as_bool().map(ConfigValue::Boolean),
        "string" => value.as_str().map(|s| ConfigValue::String(s.to_string())),
        _ => Some(ConfigValue::String(value.to_string())),
    };

    converted.ok_or_else(|| {
        let expected = match value_type {
            "number" => "رقم",
            "boolean" => "قيمة منطقية",
            _ => "نص",
        };
        AppError::bad_request(format!("نوع القيمة غير صحيح: المطلوب {}", expected))
    })
}

/// 查找配置项并按声明类型转换新值
async fn prepare_update(app_state: &AppState, req: &UpdateConfigRequest) -> AppResult<(String, ConfigValue)> {
    let config = SystemConfig::find()
        .filter(system_config::Column::Key.eq(&req.key))
        .one(&app_state.db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("الإعداد غير موجود: {}", req.key)))?;

    let value = convert_value(&config.value_type, &req.value)?;
    Ok((config.key, value))
}

/// 校验整批待写入的值，人数上下限按写入后的组合比较
async fn validate_prepared(app_state: &AppState, prepared: &[(String, ConfigValue)]) -> AppResult<()> {
    app_state
        .config_manager
        .validate_all(prepared)
        .await
        .map_err(AppError::bad_request)
}

async fn find_item(app_state: &AppState, key: &str) -> AppResult<ConfigItem> {
    SystemConfig::find()
        .filter(system_config::Column::Key.eq(key))
        .one(&app_state.db)
        .await?
        .map(ConfigItem::from)
        .ok_or_else(|| AppError::not_found(format!("الإعداد غير موجود: {}", key)))
}

/// GET /api/v1/online-users-settings
pub async fn online_users_settings(Extension(app_state): Extension<AppState>) -> ApiResult<OnlineUsersSettings> {
    respond(Ok(app_state.config_manager.online_users_settings().await))
}

/// GET /api/v1/admin/system/configs
pub async fn get_configs(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<ConfigListResponse> {
    let result = async {
        require_admin(auth_user)?;
        let configs = SystemConfig::find()
            .order_by_asc(system_config::Column::Id)
            .all(&app_state.db)
            .await?;
        Ok::<_, AppError>(ConfigListResponse {
            configs: configs.into_iter().map(ConfigItem::from).collect(),
        })
    }
    .await;
    respond(result)
}

/// POST /api/v1/admin/system/configs/update
pub async fn update_config(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(payload): Json<UpdateConfigRequest>,
) -> ApiResult<ConfigItem> {
    let result = async {
        let admin = require_admin(auth_user)?;
        let prepared = prepare_update(&app_state, &payload).await?;
        validate_prepared(&app_state, std::slice::from_ref(&prepared)).await?;
        let (key, value) = prepared;
        app_state.config_manager.set(&key, value).await?;
        tracing::info!("⚙️ 管理员 {} 更新配置: {}", admin.email, payload.key);
        find_item(&app_state, &payload.key).await
    }
    .await;
    respond_with(result, "تم حفظ الإعدادات بنجاح")
}

/// POST /api/v1/admin/system/configs/batch：先全部校验，任一无效则不写入
pub async fn batch_update_configs(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(payload): Json<BatchUpdateConfigRequest>,
) -> ApiResult<ConfigListResponse> {
    let result = async {
        let admin = require_admin(auth_user)?;

        let mut prepared = Vec::with_capacity(payload.configs.len());
        for req in &payload.configs {
            prepared.push(prepare_update(&app_state, req).await?);
        }
        validate_prepared(&app_state, &prepared).await?;

        let mut updated = Vec::with_capacity(prepared.len());
        for (key, value) in prepared {
            app_state.config_manager.set(&key, value).await?;
            updated.push(find_item(&app_state, &key).await?);
        }

        tracing::info!("⚙️ 管理员 {} 批量更新 {} 项配置", admin.email, updated.len());
        Ok::<_, AppError>(ConfigListResponse { configs: updated })
    }
    .await;
    respond_with(result, "تم حفظ الإعدادات بنجاح")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_value_by_type() {
        assert_eq!(convert_value("number", &json!(25)).unwrap(), ConfigValue::Number(25));
        assert_eq!(convert_value("number", &json!(0.8)).unwrap(), ConfigValue::Float(0.8));
        assert_eq!(convert_value("boolean", &json!(true)).unwrap(), ConfigValue::Boolean(true));
        assert_eq!(
            convert_value("string", &json!("paid")).unwrap(),
            ConfigValue::String("paid".into())
        );
    }

    #[test]
    fn test_convert_value_rejects_wrong_type() {
        assert_eq!(convert_value("number", &json!("abc")).unwrap_err().status(), 400);
        assert_eq!(convert_value("boolean", &json!(1)).unwrap_err().status(), 400);
        assert_eq!(convert_value("string", &json!(5)).unwrap_err().status(), 400);
    }
}
