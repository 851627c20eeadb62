//! 管理后台接口，全部要求管理员身份

use axum::{
    extract::{Extension, Path, Query},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    catalog::{
        self, BusinessTypeInput, CategoryInput, CityInput, ExchangeRateInput, FeaturedPlanInput, GovernorateInput,
        NotificationPlanInput, PaymentAccountInput,
    },
    entity::{
        business_type, category, city, exchange_rate, featured_plan, governorate, merchant, merchant_request,
        notification, notification_credit, notification_plan, notification_purchase, payment_account,
        ApprovalStatus, BusinessType, Category, City, ExchangeRate, FeaturedPlan, Governorate, NotificationPlan,
        PaymentAccount, PromotionStatus, PurchaseStatus,
    },
    error::{AppError, AppResult},
    expiry::{self, SweepReport},
    merchants,
    middleware::{require_admin, AuthUser},
    notifications::{self, push::PushReport, Broadcast, PurchaseView},
    promotions::{
        deal_of_day::{self, DealRequestView},
        featured::{self, FeaturedRequestView},
    },
    AppState,
};

use super::{respond, respond_with, ApiResult};

#[derive(Deserialize)]
pub struct StatusQuery<S> {
    pub status: Option<S>,
}

#[derive(Deserialize, Default)]
pub struct ReviewNotes {
    pub admin_notes: Option<String>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    #[serde(alias = "rejection_reason")]
    pub reason: String,
}

impl RejectRequest {
    fn into_reason(self) -> AppResult<String> {
        let reason = self.reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::bad_request("سبب الرفض مطلوب"));
        }
        Ok(reason)
    }
}

// ---------- 商家入驻 ----------

/// GET /api/v1/admin/merchant-requests?status=
pub async fn admin_list_merchant_requests(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<StatusQuery<ApprovalStatus>>,
) -> ApiResult<Vec<merchant_request::Model>> {
    let result = async {
        require_admin(auth_user)?;
        merchants::list_requests(&app_state.db, query.status).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/admin/merchant-requests/{id}/approve
pub async fn admin_approve_merchant_request(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<merchant::Model> {
    let result = async {
        let admin = require_admin(auth_user)?;
        let merchant = merchants::approve_request(&app_state.db, id).await?;
        info!("🛡️ 管理员 {} 通过商家申请 #{}", admin.email, id);
        Ok::<_, AppError>(merchant)
    }
    .await;
    respond_with(result, "تمت الموافقة على الطلب")
}

/// POST /api/v1/admin/merchant-requests/{id}/reject
pub async fn admin_reject_merchant_request(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<merchant_request::Model> {
    let result = async {
        require_admin(auth_user)?;
        merchants::reject_request(&app_state.db, id, req.into_reason()?).await
    }
    .await;
    respond_with(result, "تم رفض الطلب")
}

#[derive(Deserialize)]
pub struct MerchantStatusRequest {
    pub status: ApprovalStatus,
}

/// PUT /api/v1/admin/merchants/{id}/status
pub async fn admin_set_merchant_status(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<MerchantStatusRequest>,
) -> ApiResult<merchant::Model> {
    let result = async {
        let admin = require_admin(auth_user)?;
        let merchant = merchants::set_status(&app_state.db, id, req.status).await?;
        info!("🛡️ 管理员 {} 将商家 #{} 状态改为 {}", admin.email, id, req.status.label());
        Ok::<_, AppError>(merchant)
    }
    .await;
    respond_with(result, "تم تحديث حالة التاجر")
}

// ---------- 置顶广告 ----------

/// GET /api/v1/admin/featured-requests?status=
pub async fn admin_list_featured_requests(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<StatusQuery<PromotionStatus>>,
) -> ApiResult<Vec<FeaturedRequestView>> {
    let result = async {
        require_admin(auth_user)?;
        let requests = featured::list_by_status(&app_state.db, query.status).await?;
        featured::build_views(&app_state.db, requests).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/admin/featured-requests/{id}/activate
pub async fn admin_activate_featured(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    notes: Option<Json<ReviewNotes>>,
) -> ApiResult<FeaturedRequestView> {
    let result = async {
        require_admin(auth_user)?;
        let notes = notes.map(|Json(n)| n).unwrap_or_default();
        let request = featured::activate(&app_state.db, id, notes.admin_notes, Utc::now().naive_utc()).await?;
        let mut views = featured::build_views(&app_state.db, vec![request]).await?;
        views.pop().ok_or_else(|| AppError::not_found("الطلب غير موجود"))
    }
    .await;
    respond_with(result, "تم تفعيل الإعلان")
}

/// POST /api/v1/admin/featured-requests/{id}/reject
pub async fn admin_reject_featured(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<FeaturedRequestView> {
    let result = async {
        require_admin(auth_user)?;
        let request = featured::reject(&app_state.db, id, req.into_reason()?).await?;
        let mut views = featured::build_views(&app_state.db, vec![request]).await?;
        views.pop().ok_or_else(|| AppError::not_found("الطلب غير موجود"))
    }
    .await;
    respond_with(result, "تم رفض الطلب")
}

// ---------- 今日特惠 ----------

/// GET /api/v1/admin/deal-requests?status=
pub async fn admin_list_deal_requests(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<StatusQuery<PromotionStatus>>,
) -> ApiResult<Vec<DealRequestView>> {
    let result = async {
        require_admin(auth_user)?;
        let requests = deal_of_day::list_by_status(&app_state.db, query.status).await?;
        deal_of_day::build_views(&app_state.db, requests).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/admin/deal-requests/{id}/activate
pub async fn admin_activate_deal(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    notes: Option<Json<ReviewNotes>>,
) -> ApiResult<DealRequestView> {
    let result = async {
        require_admin(auth_user)?;
        let notes = notes.map(|Json(n)| n).unwrap_or_default();
        let request = deal_of_day::activate(&app_state.db, id, notes.admin_notes, Utc::now().naive_utc()).await?;
        let mut views = deal_of_day::build_views(&app_state.db, vec![request]).await?;
        views.pop().ok_or_else(|| AppError::not_found("الطلب غير موجود"))
    }
    .await;
    respond_with(result, "تم تفعيل صفقة اليوم")
}

/// POST /api/v1/admin/deal-requests/{id}/reject
pub async fn admin_reject_deal(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<DealRequestView> {
    let result = async {
        require_admin(auth_user)?;
        let request = deal_of_day::reject(&app_state.db, id, req.into_reason()?).await?;
        let mut views = deal_of_day::build_views(&app_state.db, vec![request]).await?;
        views.pop().ok_or_else(|| AppError::not_found("الطلب غير موجود"))
    }
    .await;
    respond_with(result, "تم رفض الطلب")
}

// ---------- 推送额度购买 ----------

/// GET /api/v1/admin/notification-purchases?status=
pub async fn admin_list_purchases(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<StatusQuery<PurchaseStatus>>,
) -> ApiResult<Vec<PurchaseView>> {
    let result = async {
        require_admin(auth_user)?;
        let purchases = notifications::list_purchases_by_status(&app_state.db, query.status).await?;
        notifications::build_purchase_views(&app_state.db, purchases).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/admin/notification-purchases/{id}/approve，返回商家更新后的额度
pub async fn admin_approve_purchase(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    notes: Option<Json<ReviewNotes>>,
) -> ApiResult<notification_credit::Model> {
    let result = async {
        require_admin(auth_user)?;
        let notes = notes.map(|Json(n)| n).unwrap_or_default();
        notifications::approve_purchase(&app_state.db, id, notes.admin_notes).await
    }
    .await;
    respond_with(result, "تمت الموافقة وإضافة الرصيد")
}

/// POST /api/v1/admin/notification-purchases/{id}/reject
pub async fn admin_reject_purchase(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<notification_purchase::Model> {
    let result = async {
        require_admin(auth_user)?;
        notifications::reject_purchase(&app_state.db, id, req.into_reason()?).await
    }
    .await;
    respond_with(result, "تم رفض الطلب")
}

// ---------- 群发 ----------

#[derive(Serialize)]
pub struct BroadcastResponse {
    #[serde(flatten)]
    pub notification: notification::Model,
    pub report: PushReport,
}

/// POST /api/v1/admin/notifications/send
pub async fn admin_broadcast(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<Broadcast>,
) -> ApiResult<BroadcastResponse> {
    let result = async {
        let admin = require_admin(auth_user)?;
        let (notification, report) =
            notifications::broadcast(&app_state.db, app_state.push.as_ref(), admin.id, req).await?;
        info!(
            "📣 管理员 {} 群发通知 #{}: 成功 {} 失败 {}",
            admin.email, notification.id, report.success, report.failure
        );
        Ok::<_, AppError>(BroadcastResponse { notification, report })
    }
    .await;
    respond_with(result, "تم إرسال الإشعار")
}

/// GET /api/v1/admin/notifications/history
pub async fn admin_broadcast_history(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<notification::Model>> {
    let result = async {
        require_admin(auth_user)?;
        notifications::broadcast_history(&app_state.db).await
    }
    .await;
    respond(result)
}

// ---------- 基础数据 ----------

/// POST /api/v1/admin/governorates
pub async fn admin_create_governorate(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<GovernorateInput>,
) -> ApiResult<governorate::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_governorate(&app_state.db, None, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// PUT /api/v1/admin/governorates/{id}
pub async fn admin_update_governorate(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<GovernorateInput>,
) -> ApiResult<governorate::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_governorate(&app_state.db, Some(id), req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/governorates/{id}
pub async fn admin_delete_governorate(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<Governorate>(&app_state.db, id, "المحافظة غير موجودة").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

/// POST /api/v1/admin/cities
pub async fn admin_create_city(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<CityInput>,
) -> ApiResult<city::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_city(&app_state.db, None, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// PUT /api/v1/admin/cities/{id}
pub async fn admin_update_city(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<CityInput>,
) -> ApiResult<city::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_city(&app_state.db, Some(id), req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/cities/{id}
pub async fn admin_delete_city(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<City>(&app_state.db, id, "المدينة غير موجودة").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

/// POST /api/v1/admin/categories
pub async fn admin_create_category(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<CategoryInput>,
) -> ApiResult<category::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_category(&app_state.db, None, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// PUT /api/v1/admin/categories/{id}
pub async fn admin_update_category(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<CategoryInput>,
) -> ApiResult<category::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_category(&app_state.db, Some(id), req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/categories/{id}
pub async fn admin_delete_category(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<Category>(&app_state.db, id, "التصنيف غير موجود").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

/// POST /api/v1/admin/business-types
pub async fn admin_create_business_type(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<BusinessTypeInput>,
) -> ApiResult<business_type::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_business_type(&app_state.db, None, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// PUT /api/v1/admin/business-types/{id}
pub async fn admin_update_business_type(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<BusinessTypeInput>,
) -> ApiResult<business_type::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_business_type(&app_state.db, Some(id), req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/business-types/{id}
pub async fn admin_delete_business_type(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<BusinessType>(&app_state.db, id, "نوع النشاط غير موجود").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

/// PUT /api/v1/admin/exchange-rates：同一币种与地区只有一条汇率
pub async fn admin_upsert_exchange_rate(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<ExchangeRateInput>,
) -> ApiResult<exchange_rate::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::upsert_exchange_rate(&app_state.db, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/exchange-rates/{id}
pub async fn admin_delete_exchange_rate(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<ExchangeRate>(&app_state.db, id, "سعر الصرف غير موجود").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

/// POST /api/v1/admin/payment-accounts
pub async fn admin_create_payment_account(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<PaymentAccountInput>,
) -> ApiResult<payment_account::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_payment_account(&app_state.db, None, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// PUT /api/v1/admin/payment-accounts/{id}
pub async fn admin_update_payment_account(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<PaymentAccountInput>,
) -> ApiResult<payment_account::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_payment_account(&app_state.db, Some(id), req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/payment-accounts/{id}
pub async fn admin_delete_payment_account(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<PaymentAccount>(&app_state.db, id, "الحساب غير موجود").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

/// POST /api/v1/admin/featured-plans
pub async fn admin_create_featured_plan(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<FeaturedPlanInput>,
) -> ApiResult<featured_plan::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_featured_plan(&app_state.db, None, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// PUT /api/v1/admin/featured-plans/{id}
pub async fn admin_update_featured_plan(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<FeaturedPlanInput>,
) -> ApiResult<featured_plan::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_featured_plan(&app_state.db, Some(id), req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/featured-plans/{id}
pub async fn admin_delete_featured_plan(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<FeaturedPlan>(&app_state.db, id, "الباقة غير موجودة").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

/// POST /api/v1/admin/notification-plans
pub async fn admin_create_notification_plan(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<NotificationPlanInput>,
) -> ApiResult<notification_plan::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_notification_plan(&app_state.db, None, req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// PUT /api/v1/admin/notification-plans/{id}
pub async fn admin_update_notification_plan(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<NotificationPlanInput>,
) -> ApiResult<notification_plan::Model> {
    let result = async {
        require_admin(auth_user)?;
        catalog::save_notification_plan(&app_state.db, Some(id), req).await
    }
    .await;
    respond_with(result, "تم الحفظ بنجاح")
}

/// DELETE /api/v1/admin/notification-plans/{id}
pub async fn admin_delete_notification_plan(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        require_admin(auth_user)?;
        catalog::delete_row::<NotificationPlan>(&app_state.db, id, "الباقة غير موجودة").await
    }
    .await;
    respond_with(result, "تم الحذف بنجاح")
}

// ---------- 维护 ----------

#[derive(Deserialize)]
pub struct SweepQuery {
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/v1/admin/maintenance/expire-promotions?dry_run=
pub async fn admin_expire_promotions(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<SweepQuery>,
) -> ApiResult<SweepReport> {
    let result = async {
        require_admin(auth_user)?;
        expiry::sweep(&app_state.db, Utc::now().naive_utc(), query.dry_run).await
    }
    .await;
    respond(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_required() {
        let blank = RejectRequest { reason: "   ".into() };
        assert_eq!(blank.into_reason().unwrap_err().status(), 400);

        let given = RejectRequest {
            reason: " إيصال غير واضح ".into(),
        };
        assert_eq!(given.into_reason().unwrap(), "إيصال غير واضح");
    }

    #[test]
    fn test_status_query_parses_codes() {
        let query: StatusQuery<PromotionStatus> = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(query.status, Some(PromotionStatus::Pending));

        let query: StatusQuery<ApprovalStatus> = serde_json::from_str("{}").unwrap();
        assert_eq!(query.status, None);
    }
}
