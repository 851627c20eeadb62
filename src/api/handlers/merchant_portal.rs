use axum::{
    extract::{Extension, Multipart, Path, Query},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::path::Path as FsPath;
use tracing::info;

use crate::{
    analytics::{self, Analytics, Dashboard, DEFAULT_ANALYTICS_DAYS},
    entity::{merchant, merchant_request, offer_image},
    error::{AppError, AppResult},
    media::{check_upload, discard_on_error, save_upload, MediaKind, MultipartForm},
    merchants::{self, MerchantRequestInput, MerchantSettings, MerchantStatus},
    middleware::{require_user, AuthUser},
    offers::{self, OfferInput, OfferPatch, OfferView},
    AppState,
};

use super::{respond, respond_created, respond_with, ApiResult};

/// 当前登录用户对应的已审核商家
pub(crate) async fn current_merchant(app_state: &AppState, auth_user: Option<AuthUser>) -> AppResult<merchant::Model> {
    let user = require_user(auth_user)?;
    merchants::require_approved(&app_state.db, user.id).await
}

/// GET /api/v1/merchant/check-status
pub async fn merchant_check_status(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<MerchantStatus> {
    let result = async {
        let user = require_user(auth_user)?;
        merchants::check_status(&app_state.db, user.id).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/merchant/request
pub async fn submit_merchant_request(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<MerchantRequestInput>,
) -> ApiResult<merchant_request::Model> {
    let result = async {
        let user = require_user(auth_user)?;
        merchants::submit_request(&app_state.db, user.id, req).await
    }
    .await;
    respond_created(result, "تم إرسال طلبك بنجاح، سيتم مراجعته قريباً")
}

/// GET /api/v1/merchant/dashboard
pub async fn merchant_dashboard(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Dashboard> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        analytics::dashboard(&app_state.db, merchant, Utc::now().naive_utc()).await
    }
    .await;
    respond(result)
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

/// GET /api/v1/merchant/analytics?days=
pub async fn merchant_analytics(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Analytics> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let days = query.days.unwrap_or(DEFAULT_ANALYTICS_DAYS);
        analytics::analytics(&app_state.db, &merchant, days, Utc::now().naive_utc()).await
    }
    .await;
    respond(result)
}

/// PUT /api/v1/merchant/settings
pub async fn update_merchant_settings(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<MerchantSettings>,
) -> ApiResult<merchant::Model> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        merchants::update_settings(&app_state.db, merchant, req).await
    }
    .await;
    respond_with(result, "تم حفظ الإعدادات بنجاح")
}

/// POST /api/v1/merchant/logo (multipart: logo)
pub async fn upload_merchant_logo(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    multipart: Multipart,
) -> ApiResult<merchant::Model> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let mut form = MultipartForm::read(multipart).await?;
        let upload = form
            .take_file(&["logo", "file"])
            .ok_or_else(|| AppError::bad_request("يجب رفع صورة الشعار"))?;

        let media_dir = FsPath::new(&app_state.config.media_dir);
        let path = save_upload(media_dir, MediaKind::Logo, &upload).await?;
        let saved = [path.clone()];
        discard_on_error(media_dir, &saved, merchants::set_logo(&app_state.db, merchant, path).await).await
    }
    .await;
    respond_with(result, "تم تحديث الشعار بنجاح")
}

/// GET /api/v1/merchant/offers
pub async fn merchant_list_offers(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
) -> ApiResult<Vec<OfferView>> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let found = offers::list_for_merchant(&app_state.db, merchant.id).await?;
        offers::build_views(&app_state.db, found, None).await
    }
    .await;
    respond(result)
}

/// POST /api/v1/merchant/offers
pub async fn merchant_create_offer(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Json(req): Json<OfferInput>,
) -> ApiResult<OfferView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let offer = offers::create_for_merchant(&app_state.db, &merchant, req).await?;
        info!("🏷️ 商家 #{} 新建优惠 #{}", merchant.id, offer.id);
        offers::build_view(&app_state.db, offer, None).await
    }
    .await;
    respond_created(result, "تم إضافة العرض بنجاح")
}

/// PUT /api/v1/merchant/offers/{id}
pub async fn merchant_update_offer(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    Json(req): Json<OfferPatch>,
) -> ApiResult<OfferView> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let offer = offers::update_for_merchant(&app_state.db, merchant.id, id, req).await?;
        offers::build_view(&app_state.db, offer, None).await
    }
    .await;
    respond_with(result, "تم تحديث العرض بنجاح")
}

/// DELETE /api/v1/merchant/offers/{id}
pub async fn merchant_delete_offer(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        offers::delete_for_merchant(&app_state.db, merchant.id, id).await
    }
    .await;
    respond_with(result, "تم حذف العرض بنجاح")
}

/// POST /api/v1/merchant/offers/{id}/images (multipart: images)
pub async fn merchant_upload_offer_images(
    Extension(app_state): Extension<AppState>,
    Extension(auth_user): Extension<Option<AuthUser>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Vec<offer_image::Model>> {
    let result = async {
        let merchant = current_merchant(&app_state, auth_user).await?;
        let offer = offers::find_owned(&app_state.db, merchant.id, id).await?;

        let mut form = MultipartForm::read(multipart).await?;
        let uploads = form.take_files(&["images", "image"]);
        if uploads.is_empty() {
            return Err(AppError::bad_request("يجب رفع صورة واحدة على الأقل"));
        }

        // 全部校验通过后再落盘，任何一张失败都不留下文件
        for upload in &uploads {
            check_upload(MediaKind::OfferImage, upload)?;
        }

        let media_dir = FsPath::new(&app_state.config.media_dir);
        let mut paths = Vec::with_capacity(uploads.len());
        let written = async {
            for upload in &uploads {
                paths.push(save_upload(media_dir, MediaKind::OfferImage, upload).await?);
            }
            Ok::<_, AppError>(())
        }
        .await;
        discard_on_error(media_dir, &paths, written).await?;

        let stored = async {
            let mut images = Vec::with_capacity(paths.len());
            for path in &paths {
                images.push(offers::add_image(&app_state.db, offer.id, path.clone()).await?);
            }
            Ok::<_, AppError>(images)
        }
        .await;
        discard_on_error(media_dir, &paths, stored).await
    }
    .await;
    respond_created(result, "تم رفع الصور بنجاح")
}
