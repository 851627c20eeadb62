//! 商家：入驻申请、审核、公开资料与设置

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entity::{
    city, merchant, merchant_request, user, ApprovalStatus, BusinessType, City, Merchant, MerchantRequest, User,
    UserType,
};
use crate::error::{AppError, AppResult};

pub const TOP_MERCHANTS_LIMIT: u64 = 5;

/// 公开的商家资料
#[derive(Debug, Clone, Serialize)]
pub struct MerchantProfile {
    #[serde(flatten)]
    pub merchant: merchant::Model,
    pub status_label: &'static str,
    pub city_name: Option<String>,
    pub business_type_name: Option<String>,
}

pub async fn find_merchant(db: &DatabaseConnection, merchant_id: i64) -> AppResult<merchant::Model> {
    Merchant::find_by_id(merchant_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("التاجر غير موجود"))
}

pub async fn find_by_user(db: &DatabaseConnection, user_id: i64) -> AppResult<Option<merchant::Model>> {
    Ok(Merchant::find()
        .filter(merchant::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// 商家后台入口：必须有已审核的商家账号
pub async fn require_approved(db: &DatabaseConnection, user_id: i64) -> AppResult<merchant::Model> {
    let merchant = find_by_user(db, user_id)
        .await?
        .ok_or_else(|| AppError::forbidden("هذه الخدمة متاحة للتجار فقط"))?;

    if merchant.status != ApprovalStatus::Approved {
        return Err(AppError::forbidden("حساب التاجر غير مفعل بعد"));
    }
    Ok(merchant)
}

pub async fn profile(db: &DatabaseConnection, merchant: merchant::Model) -> AppResult<MerchantProfile> {
    let city_name = match merchant.city_id {
        Some(id) => City::find_by_id(id).one(db).await?.map(|c| c.name),
        None => None,
    };
    let business_type_name = match merchant.business_type_id {
        Some(id) => BusinessType::find_by_id(id).one(db).await?.map(|b| b.name),
        None => None,
    };

    Ok(MerchantProfile {
        status_label: merchant.status.label(),
        merchant,
        city_name,
        business_type_name,
    })
}

/// 评分最高的已审核商家
pub async fn top_merchants(db: &DatabaseConnection, city_id: Option<i64>) -> AppResult<Vec<merchant::Model>> {
    let mut query = Merchant::find()
        .filter(merchant::Column::Status.eq(ApprovalStatus::Approved))
        .filter(merchant::Column::OffersCount.gt(0));
    if let Some(city_id) = city_id {
        query = query.filter(merchant::Column::CityId.eq(city_id));
    }

    Ok(query
        .order_by_desc(merchant::Column::AverageRating)
        .order_by_desc(merchant::Column::OffersCount)
        .limit(TOP_MERCHANTS_LIMIT)
        .all(db)
        .await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct MerchantRequestInput {
    pub business_name: String,
    pub business_type_id: Option<i64>,
    pub governorate_id: i64,
    pub city_id: i64,
    pub phone: String,
    pub address: Option<String>,
    pub description: Option<String>,
}

/// 提交入驻申请，每个用户只能提交一次
pub async fn submit_request(
    db: &DatabaseConnection,
    user_id: i64,
    input: MerchantRequestInput,
) -> AppResult<merchant_request::Model> {
    if input.business_name.trim().is_empty() || input.phone.trim().is_empty() {
        return Err(AppError::bad_request("اسم النشاط ورقم الهاتف مطلوبان"));
    }

    let existing = MerchantRequest::find()
        .filter(merchant_request::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::bad_request("لقد قمت بتقديم طلب مسبقاً"));
    }

    let city = City::find_by_id(input.city_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::bad_request("المدينة غير موجودة"))?;
    if city.governorate_id != input.governorate_id {
        return Err(AppError::bad_request("المدينة لا تتبع المحافظة المختارة"));
    }

    let request = merchant_request::ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        business_name: Set(input.business_name.trim().to_string()),
        business_type_id: Set(input.business_type_id),
        governorate_id: Set(input.governorate_id),
        city_id: Set(input.city_id),
        phone: Set(input.phone.trim().to_string()),
        address: Set(input.address),
        description: Set(input.description),
        status: Set(ApprovalStatus::Pending),
        rejection_reason: Set(None),
        reviewed_at: Set(None),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?;

    info!("📋 新的商家入驻申请: {} (user {})", request.business_name, user_id);
    Ok(request)
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantStatus {
    pub is_merchant: bool,
    pub has_request: bool,
    pub request_status: Option<ApprovalStatus>,
    pub request_status_label: Option<&'static str>,
    pub rejection_reason: Option<String>,
    pub merchant_status: Option<ApprovalStatus>,
}

pub async fn check_status(db: &DatabaseConnection, user_id: i64) -> AppResult<MerchantStatus> {
    let merchant = find_by_user(db, user_id).await?;
    let request = MerchantRequest::find()
        .filter(merchant_request::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    Ok(MerchantStatus {
        is_merchant: merchant
            .as_ref()
            .is_some_and(|m| m.status == ApprovalStatus::Approved),
        has_request: request.is_some(),
        request_status: request.as_ref().map(|r| r.status),
        request_status_label: request.as_ref().map(|r| r.status.label()),
        rejection_reason: request.and_then(|r| r.rejection_reason),
        merchant_status: merchant.map(|m| m.status),
    })
}

pub async fn list_requests(
    db: &DatabaseConnection,
    status: Option<ApprovalStatus>,
) -> AppResult<Vec<merchant_request::Model>> {
    let mut query = MerchantRequest::find();
    if let Some(status) = status {
        query = query.filter(merchant_request::Column::Status.eq(status));
    }
    Ok(query.order_by_desc(merchant_request::Column::CreatedAt).all(db).await?)
}

async fn find_request(db: &DatabaseConnection, request_id: i64) -> AppResult<merchant_request::Model> {
    MerchantRequest::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

/// 审核通过：创建或更新商家，并把用户类型改为商家
pub async fn approve_request(db: &DatabaseConnection, request_id: i64) -> AppResult<merchant::Model> {
    let request = find_request(db, request_id).await?;
    if request.status == ApprovalStatus::Approved {
        return Err(AppError::bad_request("تمت الموافقة على هذا الطلب مسبقاً"));
    }

    let now = Utc::now().naive_utc();
    let merchant = match find_by_user(db, request.user_id).await? {
        Some(existing) => {
            let mut active: merchant::ActiveModel = existing.into();
            active.business_name = Set(request.business_name.clone());
            active.business_type_id = Set(request.business_type_id);
            active.governorate_id = Set(Some(request.governorate_id));
            active.city_id = Set(Some(request.city_id));
            active.phone = Set(Some(request.phone.clone()));
            active.address = Set(request.address.clone());
            active.description = Set(request.description.clone());
            active.status = Set(ApprovalStatus::Approved);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            merchant::ActiveModel {
                id: NotSet,
                user_id: Set(request.user_id),
                business_name: Set(request.business_name.clone()),
                business_type_id: Set(request.business_type_id),
                description: Set(request.description.clone()),
                status: Set(ApprovalStatus::Approved),
                governorate_id: Set(Some(request.governorate_id)),
                city_id: Set(Some(request.city_id)),
                latitude: Set(None),
                longitude: Set(None),
                phone: Set(Some(request.phone.clone())),
                whatsapp: Set(None),
                address: Set(request.address.clone()),
                opening_hours: Set(None),
                logo: Set(None),
                delivery_phone: Set(None),
                average_rating: Set(0.0),
                reviews_count: Set(0),
                offers_count: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await?
        }
    };

    if let Some(owner) = User::find_by_id(request.user_id).one(db).await? {
        if owner.user_type != UserType::Admin {
            let mut active: user::ActiveModel = owner.into();
            active.user_type = Set(UserType::Merchant);
            active.updated_at = Set(now);
            active.update(db).await?;
        }
    }

    let mut active: merchant_request::ActiveModel = request.into();
    active.status = Set(ApprovalStatus::Approved);
    active.rejection_reason = Set(None);
    active.reviewed_at = Set(Some(now));
    active.update(db).await?;

    info!("✅ 商家入驻申请已通过: {} (merchant {})", merchant.business_name, merchant.id);
    Ok(merchant)
}

pub async fn reject_request(
    db: &DatabaseConnection,
    request_id: i64,
    reason: String,
) -> AppResult<merchant_request::Model> {
    let request = find_request(db, request_id).await?;
    if request.status != ApprovalStatus::Pending {
        return Err(AppError::bad_request("لا يمكن رفض هذا الطلب"));
    }

    let mut active: merchant_request::ActiveModel = request.into();
    active.status = Set(ApprovalStatus::Rejected);
    active.rejection_reason = Set(Some(reason));
    active.reviewed_at = Set(Some(Utc::now().naive_utc()));
    Ok(active.update(db).await?)
}

pub async fn set_status(
    db: &DatabaseConnection,
    merchant_id: i64,
    status: ApprovalStatus,
) -> AppResult<merchant::Model> {
    let merchant = find_merchant(db, merchant_id).await?;
    let mut active: merchant::ActiveModel = merchant.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MerchantSettings {
    pub business_name: Option<String>,
    pub business_type_id: Option<i64>,
    pub description: Option<String>,
    pub city_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub delivery_phone: Option<String>,
}

pub async fn update_settings(
    db: &DatabaseConnection,
    merchant: merchant::Model,
    settings: MerchantSettings,
) -> AppResult<merchant::Model> {
    if let Some(lat) = settings.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::bad_request("خط العرض غير صالح"));
        }
    }
    if let Some(lng) = settings.longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::bad_request("خط الطول غير صالح"));
        }
    }

    let city: Option<city::Model> = match settings.city_id {
        Some(id) => Some(
            City::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| AppError::bad_request("المدينة غير موجودة"))?,
        ),
        None => None,
    };

    let mut active: merchant::ActiveModel = merchant.into();
    if let Some(name) = settings.business_name.filter(|n| !n.trim().is_empty()) {
        active.business_name = Set(name.trim().to_string());
    }
    if let Some(id) = settings.business_type_id {
        active.business_type_id = Set(Some(id));
    }
    if let Some(description) = settings.description {
        active.description = Set(Some(description));
    }
    if let Some(city) = city {
        active.city_id = Set(Some(city.id));
        active.governorate_id = Set(Some(city.governorate_id));
    }
    if let Some(lat) = settings.latitude {
        active.latitude = Set(Some(lat));
    }
    if let Some(lng) = settings.longitude {
        active.longitude = Set(Some(lng));
    }
    if let Some(phone) = settings.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(whatsapp) = settings.whatsapp {
        active.whatsapp = Set(Some(whatsapp));
    }
    if let Some(address) = settings.address {
        active.address = Set(Some(address));
    }
    if let Some(hours) = settings.opening_hours {
        active.opening_hours = Set(Some(hours));
    }
    if let Some(phone) = settings.delivery_phone {
        active.delivery_phone = Set(Some(phone));
    }
    active.updated_at = Set(Utc::now().naive_utc());

    Ok(active.update(db).await?)
}

pub async fn set_logo(db: &DatabaseConnection, merchant: merchant::Model, logo: String) -> AppResult<merchant::Model> {
    let mut active: merchant::ActiveModel = merchant.into();
    active.logo = Set(Some(logo));
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn request_input(governorate_id: i64, city_id: i64) -> MerchantRequestInput {
        MerchantRequestInput {
            business_name: "مطعم الريف".into(),
            business_type_id: None,
            governorate_id,
            city_id,
            phone: "777000111".into(),
            address: Some("شارع حدة".into()),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_request_approval_creates_merchant() {
        let db = setup_db().await;
        let gov = create_governorate(&db, "صنعاء").await;
        let city = create_city(&db, gov.id, "صنعاء", None).await;
        let user = create_user(&db, "c@tawfir.app", UserType::Customer).await;

        let request = submit_request(&db, user.id, request_input(gov.id, city.id)).await.unwrap();
        let err = submit_request(&db, user.id, request_input(gov.id, city.id)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let status = check_status(&db, user.id).await.unwrap();
        assert!(!status.is_merchant);
        assert_eq!(status.request_status, Some(ApprovalStatus::Pending));

        let merchant = approve_request(&db, request.id).await.unwrap();
        assert_eq!(merchant.status, ApprovalStatus::Approved);
        assert_eq!(merchant.city_id, Some(city.id));
        assert_eq!(merchant.phone.as_deref(), Some("777000111"));

        let owner = User::find_by_id(user.id).one(&db).await.unwrap().unwrap();
        assert_eq!(owner.user_type, UserType::Merchant);
        assert!(check_status(&db, user.id).await.unwrap().is_merchant);
        assert_eq!(require_approved(&db, user.id).await.unwrap().id, merchant.id);
    }

    #[tokio::test]
    async fn test_approval_updates_existing_merchant() {
        let db = setup_db().await;
        let gov = create_governorate(&db, "صنعاء").await;
        let city = create_city(&db, gov.id, "صنعاء", None).await;
        let user = create_user(&db, "c@tawfir.app", UserType::Customer).await;
        let existing = create_merchant(&db, user.id, None, ApprovalStatus::Rejected).await;

        let request = submit_request(&db, user.id, request_input(gov.id, city.id)).await.unwrap();
        let merchant = approve_request(&db, request.id).await.unwrap();

        assert_eq!(merchant.id, existing.id);
        assert_eq!(merchant.business_name, "مطعم الريف");
        assert_eq!(Merchant::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_city_must_belong_to_governorate() {
        let db = setup_db().await;
        let sanaa = create_governorate(&db, "صنعاء").await;
        let aden = create_governorate(&db, "عدن").await;
        let city = create_city(&db, aden.id, "عدن", None).await;
        let user = create_user(&db, "c@tawfir.app", UserType::Customer).await;

        let err = submit_request(&db, user.id, request_input(sanaa.id, city.id)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_reject_and_require_approved() {
        let db = setup_db().await;
        let gov = create_governorate(&db, "صنعاء").await;
        let city = create_city(&db, gov.id, "صنعاء", None).await;
        let user = create_user(&db, "c@tawfir.app", UserType::Customer).await;

        let request = submit_request(&db, user.id, request_input(gov.id, city.id)).await.unwrap();
        reject_request(&db, request.id, "بيانات ناقصة".into()).await.unwrap();

        let status = check_status(&db, user.id).await.unwrap();
        assert_eq!(status.request_status, Some(ApprovalStatus::Rejected));
        assert_eq!(status.rejection_reason.as_deref(), Some("بيانات ناقصة"));
        assert!(matches!(require_approved(&db, user.id).await, Err(AppError::Forbidden(_))));

        let pending_user = create_user(&db, "p@tawfir.app", UserType::Merchant).await;
        create_merchant(&db, pending_user.id, None, ApprovalStatus::Pending).await;
        assert!(matches!(
            require_approved(&db, pending_user.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_top_merchants_order() {
        let db = setup_db().await;
        let mut ids = Vec::new();
        for (i, (rating, offers)) in [(4.5, 2), (4.5, 6), (3.0, 9), (5.0, 0)].into_iter().enumerate() {
            let user = create_user(&db, &format!("m{}@tawfir.app", i), UserType::Merchant).await;
            let m = create_merchant(&db, user.id, None, ApprovalStatus::Approved).await;
            let mut active: merchant::ActiveModel = m.clone().into();
            active.average_rating = Set(rating);
            active.offers_count = Set(offers);
            active.update(&db).await.unwrap();
            ids.push(m.id);
        }

        let top: Vec<i64> = top_merchants(&db, None).await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(top, vec![ids[1], ids[0], ids[2]]);
    }

    #[tokio::test]
    async fn test_update_settings_moves_city() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let aden = create_governorate(&db, "عدن").await;
        let aden_city = create_city(&db, aden.id, "عدن", None).await;

        let settings = MerchantSettings {
            city_id: Some(aden_city.id),
            latitude: Some(12.8),
            longitude: Some(45.0),
            whatsapp: Some("967777".into()),
            ..Default::default()
        };
        let updated = update_settings(&db, fixture.merchant.clone(), settings).await.unwrap();
        assert_eq!(updated.city_id, Some(aden_city.id));
        assert_eq!(updated.governorate_id, Some(aden.id));
        assert_eq!(updated.coordinates(), Some((12.8, 45.0)));

        let bad = MerchantSettings {
            latitude: Some(120.0),
            ..Default::default()
        };
        assert!(matches!(
            update_settings(&db, updated, bad).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
