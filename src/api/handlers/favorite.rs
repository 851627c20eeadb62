use axum::extract::{Extension, Path};
use serde::Serialize;

use crate::{
    error::AppError,
    favorites::{self, ToggleOutcome},
    middleware::{require_user, AuthUser},
    offers::{self, OfferView},
    AppState,
};

use super::{respond, respond_with, ApiResult};

/// GET /api/v1/favorites
pub async fn list_favorites(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<OfferView>> {
    let result = async {
        let user = require_user(auth_user)?;
        let found = favorites::list_offers(&app_state.db, user.id).await?;
        offers::build_views(&app_state.db, found, Some(user.id)).await
    }
    .await;
    respond(result)
}

#[derive(Serialize)]
pub struct FavoriteState {
    pub offer_id: i64,
    pub is_favorited: bool,
}

/// POST /api/v1/offers/{id}/favorite：已收藏则取消
pub async fn toggle_favorite(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(offer_id): Path<i64>,
) -> ApiResult<FavoriteState> {
    let result = async {
        let user = require_user(auth_user)?;
        let outcome = favorites::toggle(&app_state.db, user.id, offer_id).await?;
        Ok::<_, AppError>(outcome)
    }
    .await;

    match result {
        Ok(outcome) => respond_with(
            Ok(FavoriteState {
                offer_id,
                is_favorited: outcome == ToggleOutcome::Added,
            }),
            outcome.message(),
        ),
        Err(err) => respond(Err(err)),
    }
}

/// DELETE /api/v1/offers/{id}/favorite
pub async fn remove_favorite(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(offer_id): Path<i64>,
) -> ApiResult<FavoriteState> {
    let result = async {
        let user = require_user(auth_user)?;
        favorites::remove(&app_state.db, user.id, offer_id).await?;
        Ok::<_, AppError>(FavoriteState {
            offer_id,
            is_favorited: false,
        })
    }
    .await;
    respond_with(result, "تم إزالة العرض من المفضلة")
}
