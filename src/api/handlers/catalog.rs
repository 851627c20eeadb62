use axum::extract::{Extension, Path, Query};
use serde::Deserialize;

use crate::catalog::{self, GovernorateDetail, GovernorateSummary};
use crate::entity::{business_type, category, city, exchange_rate};
use crate::AppState;

use super::{respond, ApiResult};

/// GET /api/v1/governorates
pub async fn list_governorates(Extension(app_state): Extension<AppState>) -> ApiResult<Vec<GovernorateSummary>> {
    respond(catalog::list_governorates(&app_state.db).await)
}

/// GET /api/v1/governorates/{id}
pub async fn get_governorate(
    Extension(app_state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<GovernorateDetail> {
    respond(catalog::governorate_detail(&app_state.db, id).await)
}

/// GET /api/v1/governorates/{id}/cities
pub async fn governorate_cities(
    Extension(app_state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<city::Model>> {
    let result = async {
        catalog::governorate_detail(&app_state.db, id).await?;
        catalog::list_cities(&app_state.db, Some(id)).await
    }
    .await;
    respond(result)
}

#[derive(Deserialize)]
pub struct CityQuery {
    pub governorate_id: Option<i64>,
}

/// GET /api/v1/cities?governorate_id=
pub async fn list_cities(
    Extension(app_state): Extension<AppState>,
    Query(query): Query<CityQuery>,
) -> ApiResult<Vec<city::Model>> {
    respond(catalog::list_cities(&app_state.db, query.governorate_id).await)
}

/// GET /api/v1/categories
pub async fn list_categories(Extension(app_state): Extension<AppState>) -> ApiResult<Vec<category::Model>> {
    respond(catalog::list_categories(&app_state.db).await)
}

/// GET /api/v1/business-types
pub async fn list_business_types(Extension(app_state): Extension<AppState>) -> ApiResult<Vec<business_type::Model>> {
    respond(catalog::list_business_types(&app_state.db).await)
}

/// GET /api/v1/exchange-rates
pub async fn list_exchange_rates(Extension(app_state): Extension<AppState>) -> ApiResult<Vec<exchange_rate::Model>> {
    respond(catalog::list_exchange_rates(&app_state.db).await)
}
