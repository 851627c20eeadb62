//! 统一业务错误
//!
//! 每个错误对应一个 HTTP 状态码和一条返回给客户端的阿拉伯语提示。

use axum::http::StatusCode;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("يجب تسجيل الدخول")]
    Unauthorized,

    /// 登录凭据错误，同样返回 401
    #[error("{0}")]
    AuthFailed(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    Database(#[from] DbErr),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::AuthFailed(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给客户端的提示，服务端错误不暴露细节
    pub fn message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "حدث خطأ في الخادم".to_string(),
            other => other.to_string(),
        }
    }
}
