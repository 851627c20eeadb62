use axum::{
    extract::Extension,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    accounts::{self, ProfileUpdate, RegisterInput, UserProfile},
    entity::{user, UserType},
    error::AppResult,
    jwt::generate_token,
    middleware::{require_user, AuthUser},
    AppState,
};

use super::{respond, respond_created, respond_with, ApiResult};

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_user: Option<bool>,
}

#[derive(Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub user_type: UserType,
    pub is_verified: bool,
    pub city_id: Option<i64>,
    pub phone: Option<String>,
}

impl From<&user::Model> for UserInfo {
    fn from(user: &user::Model) -> Self {
        UserInfo {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            user_type: user.user_type,
            is_verified: user.is_verified,
            city_id: user.city_id,
            phone: user.phone.clone(),
        }
    }
}

fn issue_token(app_state: &AppState, user: &user::Model, is_new_user: Option<bool>) -> AppResult<LoginResponse> {
    let token = generate_token(
        user.id,
        &user.email,
        user.user_type,
        &app_state.jwt_secret,
        app_state.config.jwt_expiration_hours,
    )?;

    Ok(LoginResponse {
        token,
        user: UserInfo::from(user),
        is_new_user,
    })
}

/// POST /api/v1/auth/register
pub async fn register(
    Extension(app_state): Extension<AppState>,
    Json(req): Json<RegisterInput>,
) -> ApiResult<LoginResponse> {
    let result = async {
        let user = accounts::register(&app_state.db, req).await?;
        issue_token(&app_state, &user, Some(true))
    }
    .await;
    respond_created(result, "تم إنشاء الحساب بنجاح")
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/login
pub async fn login(
    Extension(app_state): Extension<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let result = async {
        let user = accounts::login(&app_state.db, &req.email, &req.password).await?;
        issue_token(&app_state, &user, None)
    }
    .await;
    respond_with(result, "تم تسجيل الدخول بنجاح")
}

#[derive(Deserialize)]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub id_token: String,
    /// 以下字段只在开发模式下使用
    pub email: Option<String>,
    pub name: Option<String>,
}

/// POST /api/v1/auth/google
pub async fn google_login(
    Extension(app_state): Extension<AppState>,
    Json(req): Json<GoogleLoginRequest>,
) -> ApiResult<LoginResponse> {
    let result = async {
        let identity = app_state
            .google
            .verify(&req.id_token, req.email.as_deref(), req.name.as_deref())
            .await?;
        let (user, created) = accounts::google_sign_in(&app_state.db, identity).await?;
        issue_token(&app_state, &user, Some(created))
    }
    .await;

    let message = match &result {
        Ok(response) if response.is_new_user == Some(true) => "مرحباً بك في توفير!",
        _ => "تم تسجيل الدخول بنجاح",
    };
    respond_with(result, message)
}

/// GET /api/v1/auth/me
pub async fn me(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<UserProfile> {
    let result = async {
        let auth_user = require_user(auth_user)?;
        let user = accounts::find_user(&app_state.db, auth_user.id).await?;
        accounts::profile(&app_state.db, user).await
    }
    .await;
    respond(result)
}

/// PUT /api/v1/auth/profile
pub async fn update_profile(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<ProfileUpdate>,
) -> ApiResult<UserProfile> {
    let result = async {
        let auth_user = require_user(auth_user)?;
        let user = accounts::update_profile(&app_state.db, auth_user.id, req).await?;
        accounts::profile(&app_state.db, user).await
    }
    .await;
    respond_with(result, "تم تحديث البيانات بنجاح")
}

#[derive(Serialize)]
pub struct CheckAuthResponse {
    pub authenticated: bool,
    pub user_id: Option<i64>,
    pub user_type: Option<UserType>,
}

/// GET /api/v1/check-auth
pub async fn check_auth(Extension(auth_user): Extension<Option<AuthUser>>) -> ApiResult<CheckAuthResponse> {
    let response = CheckAuthResponse {
        authenticated: auth_user.is_some(),
        user_id: auth_user.as_ref().map(|u| u.id),
        user_type: auth_user.map(|u| u.user_type),
    };
    respond(Ok(response))
}
