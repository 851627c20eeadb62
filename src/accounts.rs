//! 用户账号：注册、登录、Google 登录、资料维护、管理员初始化

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{generate_random_password, hash_password, verify_password};
use crate::entity::{user, ApprovalStatus, City, User, UserType};
use crate::error::{AppError, AppResult};
use crate::google_auth::GoogleIdentity;
use crate::merchants;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub phone: Option<String>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn find_by_email(db: &DatabaseConnection, email: &str) -> AppResult<Option<user::Model>> {
    Ok(User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?)
}

pub async fn find_user(db: &DatabaseConnection, user_id: i64) -> AppResult<user::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("المستخدم غير موجود"))
}

/// 邮箱注册，新账号均为普通用户
pub async fn register(db: &DatabaseConnection, input: RegisterInput) -> AppResult<user::Model> {
    let email = normalize_email(&input.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("البريد الإلكتروني غير صالح"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("كلمة المرور يجب أن تكون 8 أحرف على الأقل"));
    }
    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::bad_request("البريد الإلكتروني مستخدم بالفعل"));
    }

    let password_hash = hash_password(&input.password)?;
    let now = Utc::now().naive_utc();
    let user = user::ActiveModel {
        id: NotSet,
        email: Set(email),
        full_name: Set(input.full_name.trim().to_string()),
        phone: Set(input.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())),
        password_hash: Set(Some(password_hash)),
        google_id: Set(None),
        user_type: Set(UserType::Customer),
        city_id: Set(None),
        selected_city_id: Set(None),
        is_verified: Set(false),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!("👤 新用户注册: {}", user.email);
    Ok(user)
}

/// 邮箱密码登录
pub async fn login(db: &DatabaseConnection, email: &str, password: &str) -> AppResult<user::Model> {
    let invalid = || AppError::auth_failed("البريد الإلكتروني أو كلمة المرور غير صحيحة");

    let user = find_by_email(db, &normalize_email(email)).await?.ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(password, hash)? {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::forbidden("الحساب معطل"));
    }
    Ok(user)
}

/// Google 登录：按邮箱查找或创建，返回 (用户, 是否新建)
pub async fn google_sign_in(db: &DatabaseConnection, identity: GoogleIdentity) -> AppResult<(user::Model, bool)> {
    let email = normalize_email(&identity.email);

    if let Some(existing) = find_by_email(db, &email).await? {
        if !existing.is_active {
            return Err(AppError::forbidden("الحساب معطل"));
        }
        let needs_google_id = existing.google_id.is_none();
        let needs_name = existing.full_name.trim().is_empty() && !identity.name.is_empty();
        if !needs_google_id && !needs_name {
            return Ok((existing, false));
        }

        let mut active: user::ActiveModel = existing.into();
        if needs_google_id {
            active.google_id = Set(Some(identity.google_id));
        }
        if needs_name {
            active.full_name = Set(identity.name);
        }
        active.updated_at = Set(Utc::now().naive_utc());
        return Ok((active.update(db).await?, false));
    }

    let now = Utc::now().naive_utc();
    let user = user::ActiveModel {
        id: NotSet,
        email: Set(email),
        full_name: Set(identity.name),
        phone: Set(None),
        password_hash: Set(None),
        google_id: Set(Some(identity.google_id)),
        user_type: Set(UserType::Customer),
        city_id: Set(None),
        selected_city_id: Set(None),
        is_verified: Set(true),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!("👤 Google 新用户: {}", user.email);
    Ok((user, true))
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantSummary {
    pub id: i64,
    pub business_name: String,
    pub status: ApprovalStatus,
    pub status_label: &'static str,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: user::Model,
    pub user_type_label: &'static str,
    pub needs_profile_completion: bool,
    pub merchant: Option<MerchantSummary>,
}

pub async fn profile(db: &DatabaseConnection, user: user::Model) -> AppResult<UserProfile> {
    let merchant = merchants::find_by_user(db, user.id).await?.map(|m| MerchantSummary {
        id: m.id,
        business_name: m.business_name,
        status: m.status,
        status_label: m.status.label(),
        logo: m.logo,
    });

    Ok(UserProfile {
        user_type_label: user.user_type.label(),
        needs_profile_completion: user.phone.is_none() || user.city_id.is_none(),
        user,
        merchant,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub city_id: Option<i64>,
    pub selected_city_id: Option<i64>,
}

async fn ensure_city(db: &DatabaseConnection, city_id: i64) -> AppResult<()> {
    City::find_by_id(city_id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("المدينة غير موجودة"))
}

/// 本地号码只去掉开头的一个 0
fn normalize_phone(phone: &str) -> Option<String> {
    let phone = phone.trim();
    let phone = phone.strip_prefix('0').unwrap_or(phone);
    (!phone.is_empty()).then(|| phone.to_string())
}

pub async fn update_profile(db: &DatabaseConnection, user_id: i64, update: ProfileUpdate) -> AppResult<user::Model> {
    let user = find_user(db, user_id).await?;
    let mut active: user::ActiveModel = user.into();

    if let Some(name) = update.full_name {
        active.full_name = Set(name.trim().to_string());
    }
    if let Some(phone) = update.phone {
        active.phone = Set(normalize_phone(&phone));
    }
    if let Some(city_id) = update.city_id {
        ensure_city(db, city_id).await?;
        active.city_id = Set(Some(city_id));
    }
    if let Some(city_id) = update.selected_city_id {
        ensure_city(db, city_id).await?;
        active.selected_city_id = Set(Some(city_id));
    }
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

pub async fn has_admin(db: &DatabaseConnection) -> AppResult<bool> {
    Ok(User::find()
        .filter(user::Column::UserType.eq(UserType::Admin))
        .one(db)
        .await?
        .is_some())
}

/// 创建管理员；邮箱已存在时提升为管理员并重置密码。返回生成的密码
pub async fn create_admin(db: &DatabaseConnection, email: &str) -> AppResult<(user::Model, String)> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AppError::bad_request("البريد الإلكتروني غير صالح"));
    }

    let password = generate_random_password(16);
    let password_hash = hash_password(&password)?;
    let now = Utc::now().naive_utc();

    let admin = match find_by_email(db, &email).await? {
        Some(existing) => {
            let mut active: user::ActiveModel = existing.into();
            active.user_type = Set(UserType::Admin);
            active.password_hash = Set(Some(password_hash));
            active.is_active = Set(true);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            user::ActiveModel {
                id: NotSet,
                email: Set(email),
                full_name: Set("مدير النظام".to_string()),
                phone: Set(None),
                password_hash: Set(Some(password_hash)),
                google_id: Set(None),
                user_type: Set(UserType::Admin),
                city_id: Set(None),
                selected_city_id: Set(None),
                is_verified: Set(true),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await?
        }
    };

    info!("🔐 管理员账号已就绪: {}", admin.email);
    Ok((admin, password))
}
