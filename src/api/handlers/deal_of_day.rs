use axum::{
    extract::{Extension, Multipart, Path, Query},
    response::Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    config_manager::{DealMode, DealOfDaySettings},
    entity::deal_of_day_request,
    error::{AppError, AppResult},
    media::discard_on_error,
    middleware::AuthUser,
    offers::{self, OfferView},
    promotions::{
        deal_of_day::{self, CreateDealRequest, DealRequestView},
        ensure_accepts_receipt, PromotionStats,
    },
    AppState,
};

use super::featured::{media_dir, read_receipt};
use super::merchant_portal::current_merchant;
use super::{respond, respond_created, respond_with, ApiResult, CityFilter};

#[derive(Serialize)]
pub struct DealView {
    pub request_id: Option<i64>,
    #[serde(flatten)]
    pub offer: OfferView,
}

#[derive(Serialize)]
pub struct DealsResponse {
    pub mode: DealMode,
    pub is_active: bool,
    pub message: Option<&'static str>,
    pub deals: Vec<DealView>,
}

/// GET /api/v1/deals-of-day?city_id=
pub async fn deals_of_day(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<CityFilter>,
) -> ApiResult<DealsResponse> {
    let result = async {
        let settings = app_state.config_manager.deal_of_day_settings().await;
        let selection =
            deal_of_day::select_deals(&app_state.db, &settings, query.city_id, Utc::now().naive_utc()).await?;

        let request_ids: Vec<i64> = selection.deals.iter().filter_map(|d| d.request_id).collect();
        if !request_ids.is_empty() {
            deal_of_day::record_impressions(&app_state.db, &request_ids).await?;
        }

        let picks: Vec<Option<i64>> = selection.deals.iter().map(|d| d.request_id).collect();
        let models = selection.deals.into_iter().map(|d| d.offer).collect();
        let views = offers::build_views(&app_state.db, models, auth_user.map(|u| u.id)).await?;

        Ok::<_, AppError>(DealsResponse {
            mode: selection.mode,
            is_active: settings.is_active,
            message: selection.message,
            deals: picks
                .into_iter()
                .zip(views)
                .map(|(request_id, offer)| DealView { request_id, offer })
                .collect(),
        })
    }
    .await;
    respond(result)
}

/// GET /api/v1/deals-of-day/settings
pub async fn deal_settings(Extension(app_state): Extension<AppState>) -> ApiResult<DealOfDaySettings> {
    respond(Ok(app_state.config_manager.deal_of_day_settings().await))
}

/// POST /api/v1/deals-of-day/{request_id}/click
pub async fn record_deal_click(
    Extension(app_state): Extension<AppState>,
    Path(request_id): Path<i64>,
) -> ApiResult<()> {
    respond(deal_of_day::record_click(&app_state.db, request_id).await)
}

async fn single_view(app_state: &AppState, request: deal_of_day_request::Model) -> AppResult<DealRequestView> {
    deal_of_day::build_views(&app_state.db, vec![request])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

/// GET /api/v1/merchant/deal-requests
pub async fn list_deal_requests(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<DealRequestView>> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let requests = deal_of_day::list_for_merchant(&app_state.db, merchant.id).await?;
        deal_of_day::build_views(&app_state.db, requests).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/merchant/deal-requests
pub async fn create_deal_request(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<CreateDealRequest>,
) -> ApiResult<DealRequestView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let settings = app_state.config_manager.deal_of_day_settings().await;
        let request = deal_of_day::create(&app_state.db, merchant.id, &settings, req).await?;
        single_view(&app_state, request).await
    }
    .await;
    respond_created(result, "تم إنشاء الطلب، يرجى رفع إيصال الدفع")
}

/// GET /api/v1/merchant/deal-requests/{id}
pub async fn get_deal_request(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<DealRequestView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let request = deal_of_day::find_owned(&app_state.db, merchant.id, id).await?;
        single_view(&app_state, request).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/merchant/deal-requests/{id}/upload-receipt (multipart)
pub async fn upload_deal_receipt(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<DealRequestView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let existing = deal_of_day::find_owned(&app_state.db, merchant.id, id).await?;
        ensure_accepts_receipt(existing.status)?;
        let receipt = read_receipt(&app_state, multipart).await?;
        let saved = [receipt.receipt.clone()];
        let stored = deal_of_day::upload_receipt(&app_state.db, merchant.id, id, receipt).await;
        let request = discard_on_error(media_dir(&app_state), &saved, stored).await?;
        single_view(&app_state, request).await
    }
    .await;
    respond_with(result, "تم رفع الإيصال بنجاح، سيتم مراجعة طلبك قريباً")
}

/// GET /api/v1/merchant/deal-requests/stats
pub async fn deal_stats(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<PromotionStats> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        deal_of_day::stats(&app_state.db, merchant.id).await
    }
    .await;
    respond(result)
}
