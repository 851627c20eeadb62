use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::entity::{User, UserType};
use crate::error::{AppError, AppResult};
use crate::jwt;
use crate::AppState;

/// Current authenticated user information extracted from JWT
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub user_type: UserType,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    /// Create AuthUser from headers
    pub fn from_headers(headers: &HeaderMap, jwt_secret: &str) -> Result<Self, StatusCode> {
        let token = extract_bearer_token(headers)?;
        let claims = jwt::verify_token(&token, jwt_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            user_type: claims.user_type,
        })
    }
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, StatusCode> {
    let auth_header = headers
        .get("authorization")
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or(StatusCode::UNAUTHORIZED)
}

/// 要求已登录
pub fn require_user(auth_user: Option<AuthUser>) -> AppResult<AuthUser> {
    auth_user.ok_or(AppError::Unauthorized)
}

/// 要求管理员
pub fn require_admin(auth_user: Option<AuthUser>) -> AppResult<AuthUser> {
    let user = require_user(auth_user)?;
    if !user.is_admin() {
        return Err(AppError::forbidden("ليس لديك صلاحية للقيام بهذا الإجراء"));
    }
    Ok(user)
}

/// 按令牌中的用户 ID 重新读取账号，已删除或停用的账号视为未登录，角色以数据库为准
async fn load_current_user(db: &DatabaseConnection, token_user: AuthUser) -> Option<AuthUser> {
    match User::find_by_id(token_user.id).one(db).await {
        Ok(Some(user)) if user.is_active => Some(AuthUser {
            id: user.id,
            email: user.email,
            user_type: user.user_type,
        }),
        Ok(_) => None,
        Err(e) => {
            tracing::error!("读取登录用户失败: {}", e);
            None
        }
    }
}

/// Middleware to extract and store AuthUser in request extensions
pub async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let auth_user = match AuthUser::from_headers(request.headers(), &state.jwt_secret) {
        Ok(token_user) => load_current_user(&state.db, token_user).await,
        Err(_) => None,
    };
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_from_headers() {
        let token = jwt::generate_token(3, "u@tawfir.app", UserType::Admin, "k", 1).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let user = AuthUser::from_headers(&headers, "k").unwrap();
        assert_eq!(user.id, 3);
        assert!(user.is_admin());
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(AuthUser::from_headers(&headers, "k").unwrap_err(), StatusCode::UNAUTHORIZED);

        headers.insert("authorization", HeaderValue::from_static("Token abc"));
        assert_eq!(AuthUser::from_headers(&headers, "k").unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_load_current_user_follows_database() {
        use crate::entity::user;
        use crate::test_support::{create_user, setup_db};
        use sea_orm::{ActiveModelTrait, Set};

        let db = setup_db().await;
        let account = create_user(&db, "m@tawfir.app", UserType::Admin).await;
        let token_user = AuthUser {
            id: account.id,
            email: account.email.clone(),
            user_type: UserType::Admin,
        };

        let mut demoted: user::ActiveModel = account.into();
        demoted.user_type = Set(UserType::Customer);
        let demoted = demoted.update(&db).await.unwrap();
        let current = load_current_user(&db, token_user.clone()).await.unwrap();
        assert_eq!(current.user_type, UserType::Customer);
        assert!(!current.is_admin());

        let mut inactive: user::ActiveModel = demoted.into();
        inactive.is_active = Set(false);
        inactive.update(&db).await.unwrap();
        assert!(load_current_user(&db, token_user).await.is_none());

        let missing = AuthUser {
            id: 9999,
            email: "ghost@tawfir.app".into(),
            user_type: UserType::Admin,
        };
        assert!(load_current_user(&db, missing).await.is_none());
    }

    #[test]
    fn test_require_admin() {
        let customer = AuthUser {
            id: 1,
            email: "c@tawfir.app".into(),
            user_type: UserType::Customer,
        };
        assert!(matches!(require_admin(Some(customer)), Err(AppError::Forbidden(_))));
        assert!(matches!(require_admin(None), Err(AppError::Unauthorized)));
    }
}
