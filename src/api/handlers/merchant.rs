use axum::{
    extract::{Extension, Path, Query},
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    entity::{review, ApprovalStatus},
    error::{AppError, AppResult},
    merchants::{self, MerchantProfile},
    middleware::{require_user, AuthUser},
    offers::{self, OfferFilter, OfferView},
    reviews::{self, ReviewView, UpsertOutcome, LATEST_REVIEWS_LIMIT},
    AppState,
};

use super::{respond, respond_with, ApiResult, CityFilter};

/// 只公开已审核的商家
async fn public_merchant(app_state: &AppState, merchant_id: i64) -> AppResult<MerchantProfile> {
    let merchant = merchants::find_merchant(&app_state.db, merchant_id).await?;
    if merchant.status != ApprovalStatus::Approved {
        return Err(AppError::not_found("التاجر غير موجود"));
    }
    merchants::profile(&app_state.db, merchant).await
}

/// GET /api/v1/top-merchants?city_id=
pub async fn top_merchants(
    Extension(app_state): Extension<AppState>,
    Query(query): Query<CityFilter>,
) -> ApiResult<Vec<MerchantProfile>> {
    let result = async {
        let top = merchants::top_merchants(&app_state.db, query.city_id).await?;
        let mut profiles = Vec::with_capacity(top.len());
        for merchant in top {
            profiles.push(merchants::profile(&app_state.db, merchant).await?);
        }
        Ok::<_, AppError>(profiles)
    }
    .await;
    respond(result)
}

/// GET /api/v1/merchants/{id}
pub async fn get_merchant(
    Extension(app_state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<MerchantProfile> {
    respond(public_merchant(&app_state, id).await)
}

/// GET /api/v1/merchants/{id}/offers
pub async fn merchant_offers(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<OfferView>> {
    let result = async {
        public_merchant(&app_state, id).await?;
        let filter = OfferFilter {
            merchant_id: Some(id),
            ..Default::default()
        };
        let found = offers::list_public(&app_state.db, &filter).await?;
        offers::build_views(&app_state.db, found, auth_user.map(|u| u.id)).await
    }
    .await;
    respond(result)
}

/// GET /api/v1/merchants/{id}/reviews
pub async fn merchant_reviews(
    Extension(app_state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<ReviewView>> {
    respond(reviews::list_for_merchant(&app_state.db, id).await)
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    #[serde(flatten)]
    pub review: review::Model,
    pub created: bool,
}

/// POST /api/v1/merchants/{id}/reviews：每个用户对同一商家只有一条评价，重复提交即更新
pub async fn create_review(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<ReviewResponse> {
    let result = async {
        let user = require_user(auth_user)?;
        let (review, outcome) = reviews::upsert(&app_state.db, user.id, id, req.rating, req.comment).await?;
        Ok::<_, AppError>(ReviewResponse {
            review,
            created: outcome == UpsertOutcome::Created,
        })
    }
    .await;

    let message = match &result {
        Ok(response) if response.created => "تم إضافة التقييم بنجاح",
        _ => "تم تحديث التقييم بنجاح",
    };
    respond_with(result, message)
}

/// PUT /api/v1/merchants/{id}/reviews
pub async fn update_review(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<review::Model> {
    let result = async {
        let user = require_user(auth_user)?;
        reviews::update(&app_state.db, user.id, id, req.rating, req.comment).await
    }
    .await;
    respond_with(result, "تم تحديث التقييم بنجاح")
}

/// DELETE /api/v1/merchants/{id}/reviews
pub async fn delete_review(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        let user = require_user(auth_user)?;
        reviews::delete(&app_state.db, user.id, id).await
    }
    .await;
    respond_with(result, "تم حذف التقييم")
}

/// GET /api/v1/latest-reviews
pub async fn latest_reviews(Extension(app_state): Extension<AppState>) -> ApiResult<Vec<ReviewView>> {
    respond(reviews::latest(&app_state.db, LATEST_REVIEWS_LIMIT).await)
}
