use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;

use crate::error::AppResult;

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod deal_of_day;
pub mod favorite;
pub mod featured;
pub mod merchant;
pub mod merchant_portal;
pub mod notification;
pub mod offer;
pub mod system_config;

pub use admin::*;
pub use auth::*;
pub use catalog::*;
pub use deal_of_day::*;
pub use favorite::*;
pub use featured::*;
pub use merchant::*;
pub use merchant_portal::*;
pub use notification::*;
pub use offer::*;
pub use system_config::*;

/// 统一响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Self::success_with_message(data, "تمت العملية بنجاح")
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(ApiResponse {
            success: true,
            data: Some(data),
            message: message.into(),
        })
    }

    pub fn error(message: String) -> Json<Self> {
        Json(ApiResponse {
            success: false,
            data: None,
            message,
        })
    }
}

pub type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

/// 把业务结果转换为 HTTP 响应，服务端错误只记录日志不返回细节
pub fn respond<T: Serialize>(result: AppResult<T>) -> ApiResult<T> {
    respond_with(result, "تمت العملية بنجاح")
}

pub fn respond_with<T: Serialize>(result: AppResult<T>, message: &str) -> ApiResult<T> {
    match result {
        Ok(data) => (StatusCode::OK, ApiResponse::success_with_message(data, message)),
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                tracing::error!("❌ 请求处理失败: {:#}", err);
            }
            (status, ApiResponse::error(err.message()))
        }
    }
}

/// 新建资源返回 201
pub fn respond_created<T: Serialize>(result: AppResult<T>, message: &str) -> ApiResult<T> {
    let (status, body) = respond_with(result, message);
    if status == StatusCode::OK {
        return (StatusCode::CREATED, body);
    }
    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_respond_maps_errors() {
        let (status, Json(body)) = respond::<i32>(Err(AppError::not_found("العرض غير موجود")));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert!(body.data.is_none());
        assert_eq!(body.message, "العرض غير موجود");

        let (status, Json(body)) = respond::<i32>(Err(AppError::Internal(anyhow::anyhow!("disk full"))));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "حدث خطأ في الخادم");
    }

    #[test]
    fn test_created_and_success_envelope() {
        let (status, Json(body)) = respond_created(Ok(7), "تم الإنشاء");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.data, Some(7));

        let json = serde_json::to_value(ApiResponse::success(1).0).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 1);
    }
}
