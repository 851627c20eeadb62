use axum::extract::{Extension, Path, Query};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    geo::{self, RandomJitter},
    middleware::AuthUser,
    offers::{self, OfferFilter, OfferView},
    AppState,
};

use super::{respond, ApiResult};

/// GET /api/v1/offers?city_id=&category_id=&merchant_id=&search=
pub async fn list_offers(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(filter): Query<OfferFilter>,
) -> ApiResult<Vec<OfferView>> {
    let result = async {
        let found = offers::list_public(&app_state.db, &filter).await?;
        offers::build_views(&app_state.db, found, auth_user.map(|u| u.id)).await
    }
    .await;
    respond(result)
}

/// GET /api/v1/offers/{id}，每次查看都计一次浏览
pub async fn get_offer(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<OfferView> {
    let result = async {
        let offer = offers::record_view(&app_state.db, id).await?;
        offers::build_view(&app_state.db, offer, auth_user.map(|u| u.id)).await
    }
    .await;
    respond(result)
}

#[derive(Serialize)]
pub struct ViewCount {
    pub views_count: i64,
}

/// POST /api/v1/offers/{id}/view
pub async fn record_offer_view(
    Extension(app_state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ViewCount> {
    let result = offers::record_view(&app_state.db, id)
        .await
        .map(|offer| ViewCount {
            views_count: offer.views_count,
        });
    respond(result)
}

#[derive(Deserialize)]
pub struct CityFilter {
    pub city_id: Option<i64>,
}

/// GET /api/v1/featured-offers?city_id=
pub async fn featured_offers(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<CityFilter>,
) -> ApiResult<Vec<OfferView>> {
    let result = async {
        let found = offers::list_featured(&app_state.db, query.city_id).await?;
        offers::build_views(&app_state.db, found, auth_user.map(|u| u.id)).await
    }
    .await;
    respond(result)
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub city_id: Option<i64>,
}

#[derive(Serialize)]
pub struct NearbyOfferView {
    #[serde(flatten)]
    pub offer: OfferView,
    pub distance_km: Option<f64>,
}

#[derive(Serialize)]
pub struct NearbyResponse {
    pub use_gps: bool,
    pub offers: Vec<NearbyOfferView>,
}

/// GET /api/v1/nearby-offers?lat=&lng=&city_id=
pub async fn nearby_offers(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<NearbyResponse> {
    let result = async {
        let position = query.lat.zip(query.lng);
        let nearby = geo::nearby_offers(&app_state.db, position, query.city_id, &mut RandomJitter).await?;

        let distances: Vec<Option<f64>> = nearby.offers.iter().map(|n| n.distance_km).collect();
        let models = nearby.offers.into_iter().map(|n| n.offer).collect();
        let views = offers::build_views(&app_state.db, models, auth_user.map(|u| u.id)).await?;

        Ok::<_, AppError>(NearbyResponse {
            use_gps: nearby.use_gps,
            offers: views
                .into_iter()
                .zip(distances)
                .map(|(offer, distance_km)| NearbyOfferView { offer, distance_km })
                .collect(),
        })
    }
    .await;
    respond(result)
}
