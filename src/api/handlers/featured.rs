use axum::{
    extract::{Extension, Multipart, Path},
    response::Json,
};
use std::path::Path as FsPath;

use crate::{
    entity::{featured_request, payment_account},
    error::{AppError, AppResult},
    media::{discard_on_error, save_upload, MediaKind, MultipartForm},
    middleware::AuthUser,
    promotions::{
        featured::{self, CreateFeaturedRequest, FeaturedRequestView, PlanView},
        ensure_accepts_receipt, PromotionStats, ReceiptInput,
    },
    AppState,
};

use super::merchant_portal::current_merchant;
use super::{respond, respond_created, respond_with, ApiResult};

pub(crate) fn media_dir(app_state: &AppState) -> &FsPath {
    FsPath::new(&app_state.config.media_dir)
}

/// 读取付款凭证表单：receipt（或 payment_receipt）文件以及付款方式、交易号
pub(crate) async fn read_receipt(app_state: &AppState, multipart: Multipart) -> AppResult<ReceiptInput> {
    let mut form = MultipartForm::read(multipart).await?;
    let upload = form
        .take_file(&["receipt", "payment_receipt"])
        .ok_or_else(|| AppError::bad_request("يرجى رفع إيصال الدفع"))?;

    let receipt = save_upload(media_dir(app_state), MediaKind::Receipt, &upload).await?;

    Ok(ReceiptInput {
        receipt,
        payment_method: form.field("payment_method"),
        transaction_number: form.field("transaction_number"),
    })
}

async fn single_view(app_state: &AppState, request: featured_request::Model) -> AppResult<FeaturedRequestView> {
    featured::build_views(&app_state.db, vec![request])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

/// GET /api/v1/payment-accounts
pub async fn list_payment_accounts(Extension(app_state): Extension<AppState>) -> ApiResult<Vec<payment_account::Model>> {
    respond(featured::list_payment_accounts(&app_state.db).await)
}

/// GET /api/v1/featured-plans
pub async fn list_featured_plans(Extension(app_state): Extension<AppState>) -> ApiResult<Vec<PlanView>> {
    respond(featured::list_plans(&app_state.db).await)
}

/// GET /api/v1/featured-requests
pub async fn list_featured_requests(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<FeaturedRequestView>> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let requests = featured::list_for_merchant(&app_state.db, merchant.id).await?;
        featured::build_views(&app_state.db, requests).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/featured-requests
pub async fn create_featured_request(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<CreateFeaturedRequest>,
) -> ApiResult<FeaturedRequestView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let request = featured::create(&app_state.db, merchant.id, req).await?;
        single_view(&app_state, request).await
    }
    .await;
    respond_created(result, "تم إنشاء الطلب، يرجى رفع إيصال الدفع")
}

/// GET /api/v1/featured-requests/{id}
pub async fn get_featured_request(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<FeaturedRequestView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let request = featured::find_owned(&app_state.db, merchant.id, id).await?;
        single_view(&app_state, request).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/featured-requests/{id}/upload-receipt (multipart)
pub async fn upload_featured_receipt(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<FeaturedRequestView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let existing = featured::find_owned(&app_state.db, merchant.id, id).await?;
        ensure_accepts_receipt(existing.status)?;
        let receipt = read_receipt(&app_state, multipart).await?;
        let saved = [receipt.receipt.clone()];
        let stored = featured::upload_receipt(&app_state.db, merchant.id, id, receipt).await;
        let request = discard_on_error(media_dir(&app_state), &saved, stored).await?;
        single_view(&app_state, request).await
    }
    .await;
    respond_with(result, "تم رفع الإيصال بنجاح، سيتم مراجعة طلبك قريباً")
}

/// GET /api/v1/featured-requests/my-active
pub async fn my_active_featured(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<FeaturedRequestView>> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let requests = featured::my_active(&app_state.db, merchant.id).await?;
        featured::build_views(&app_state.db, requests).await
    }
    .await;
    respond(result)
}

/// GET /api/v1/featured-requests/stats
pub async fn featured_stats(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<PromotionStats> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        featured::stats(&app_state.db, merchant.id).await
    }
    .await;
    respond(result)
}
