use axum::{
    extract::{Extension, Multipart, Path},
    response::Json,
};
use serde::Deserialize;

use crate::{
    entity::{notification_credit, push_notification_log},
    error::{AppError, AppResult},
    media::discard_on_error,
    middleware::{require_user, AuthUser},
    notifications::{self, NotificationPlanView, PurchaseView, SendOfferNotification, SendOutcome},
    AppState,
};

use super::featured::{media_dir, read_receipt};
use super::merchant_portal::current_merchant;
use super::{respond, respond_created, respond_with, ApiResult};

#[derive(Deserialize)]
pub struct FcmTokenRequest {
    #[serde(alias = "fcm_token")]
    pub token: String,
    pub device_type: Option<String>,
}

/// POST /api/v1/notifications/fcm-token
pub async fn register_fcm_token(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<FcmTokenRequest>,
) -> ApiResult<()> {
    let result = async {
        let user = require_user(auth_user)?;
        notifications::register_token(&app_state.db, user.id, req.token, req.device_type).await?;
        Ok::<_, AppError>(())
    }
    .await;
    respond_with(result, "تم تسجيل الجهاز بنجاح")
}

/// DELETE /api/v1/notifications/fcm-token
pub async fn delete_fcm_token(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<()> {
    let result = async {
        let user = require_user(auth_user)?;
        notifications::deactivate_token(&app_state.db, user.id).await
    }
    .await;
    respond_with(result, "تم إلغاء تسجيل الجهاز")
}

/// GET /api/v1/notifications/notification-plans
pub async fn list_notification_plans(
    Extension(app_state): Extension<AppState>,
) -> ApiResult<Vec<NotificationPlanView>> {
    respond(notifications::list_plans(&app_state.db).await)
}

/// GET /api/v1/notifications/notification-credit
pub async fn notification_credit(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<notification_credit::Model> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        notifications::credit_for(&app_state.db, merchant.id).await
    }
    .await;
    respond(result)
}

async fn single_purchase(
    app_state: &AppState,
    purchase: crate::entity::notification_purchase::Model,
) -> AppResult<PurchaseView> {
    notifications::build_purchase_views(&app_state.db, vec![purchase])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

/// GET /api/v1/notifications/notification-purchases
pub async fn list_notification_purchases(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<PurchaseView>> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let purchases = notifications::list_purchases(&app_state.db, merchant.id).await?;
        notifications::build_purchase_views(&app_state.db, purchases).await
    }
    .await;
    respond(result)
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub plan_id: i64,
}

/// POST /api/v1/notifications/notification-purchases
pub async fn create_notification_purchase(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<PurchaseRequest>,
) -> ApiResult<PurchaseView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let purchase = notifications::create_purchase(&app_state.db, merchant.id, req.plan_id).await?;
        single_purchase(&app_state, purchase).await
    }
    .await;
    respond_created(result, "تم إنشاء طلب الشراء، يرجى رفع إيصال الدفع")
}

/// POST /api/v1/notifications/notification-purchases/{id}/upload-receipt (multipart)
pub async fn upload_purchase_receipt(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<PurchaseView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let receipt = read_receipt(&app_state, multipart).await?;
        let saved = [receipt.receipt.clone()];
        let stored = notifications::upload_purchase_receipt(&app_state.db, merchant.id, id, receipt).await;
        let purchase = discard_on_error(media_dir(&app_state), &saved, stored).await?;
        single_purchase(&app_state, purchase).await
    }
    .await;
    respond_with(result, "تم رفع الإيصال بنجاح، سيتم مراجعة طلبك قريباً")
}

/// POST /api/v1/notifications/send-notification
pub async fn send_notification(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<SendOfferNotification>,
) -> ApiResult<SendOutcome> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        notifications::send_offer_notification(&app_state.db, app_state.push.as_ref(), &merchant, req).await
    }
    .await;
    respond_with(result, "تم إرسال الإشعار بنجاح")
}

/// GET /api/v1/notifications/notification-history
pub async fn notification_history(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<push_notification_log::Model>> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        notifications::history(&app_state.db, merchant.id).await
    }
    .await;
    respond(result)
}
