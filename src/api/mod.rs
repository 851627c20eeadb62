use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::middleware::auth_middleware;
use crate::AppState;

pub mod handlers;

/// 请求体上限，略大于单张图片上传的上限之和
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// 构建全部 API 路由
pub fn build_router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        // 认证
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/google", post(handlers::google_login))
        .route("/auth/me", get(handlers::me))
        .route("/auth/profile", put(handlers::update_profile))
        .route("/check-auth", get(handlers::check_auth))
        // 基础数据
        .route("/governorates", get(handlers::list_governorates))
        .route("/governorates/{id}", get(handlers::get_governorate))
        .route("/governorates/{id}/cities", get(handlers::governorate_cities))
        .route("/cities", get(handlers::list_cities))
        .route("/categories", get(handlers::list_categories))
        .route("/business-types", get(handlers::list_business_types))
        .route("/exchange-rates", get(handlers::list_exchange_rates))
        // 优惠与收藏
        .route("/offers", get(handlers::list_offers))
        .route("/offers/{id}", get(handlers::get_offer))
        .route("/offers/{id}/view", post(handlers::record_offer_view))
        .route(
            "/offers/{id}/favorite",
            post(handlers::toggle_favorite).delete(handlers::remove_favorite),
        )
        .route("/featured-offers", get(handlers::featured_offers))
        .route("/nearby-offers", get(handlers::nearby_offers))
        .route("/favorites", get(handlers::list_favorites))
        // 商家与评价
        .route("/top-merchants", get(handlers::top_merchants))
        .route("/merchants/{id}", get(handlers::get_merchant))
        .route("/merchants/{id}/offers", get(handlers::merchant_offers))
        .route(
            "/merchants/{id}/reviews",
            get(handlers::merchant_reviews)
                .post(handlers::create_review)
                .put(handlers::update_review)
                .delete(handlers::delete_review),
        )
        .route("/latest-reviews", get(handlers::latest_reviews))
        // 商家后台
        .route("/merchant/check-status", get(handlers::merchant_check_status))
        .route("/merchant/request", post(handlers::submit_merchant_request))
        .route("/merchant/dashboard", get(handlers::merchant_dashboard))
        .route("/merchant/analytics", get(handlers::merchant_analytics))
        .route("/merchant/settings", put(handlers::update_merchant_settings))
        .route("/merchant/logo", post(handlers::upload_merchant_logo))
        .route(
            "/merchant/offers",
            get(handlers::merchant_list_offers).post(handlers::merchant_create_offer),
        )
        .route(
            "/merchant/offers/{id}",
            put(handlers::merchant_update_offer).delete(handlers::merchant_delete_offer),
        )
        .route("/merchant/offers/{id}/images", post(handlers::merchant_upload_offer_images))
        .route(
            "/merchant/deal-requests",
            get(handlers::list_deal_requests).post(handlers::create_deal_request),
        )
        .route("/merchant/deal-requests/stats", get(handlers::deal_stats))
        .route("/merchant/deal-requests/{id}", get(handlers::get_deal_request))
        .route("/merchant/deal-requests/{id}/upload-receipt", post(handlers::upload_deal_receipt))
        // 置顶广告
        .route("/payment-accounts", get(handlers::list_payment_accounts))
        .route("/featured-plans", get(handlers::list_featured_plans))
        .route(
            "/featured-requests",
            get(handlers::list_featured_requests).post(handlers::create_featured_request),
        )
        .route("/featured-requests/my-active", get(handlers::my_active_featured))
        .route("/featured-requests/stats", get(handlers::featured_stats))
        .route("/featured-requests/{id}", get(handlers::get_featured_request))
        .route("/featured-requests/{id}/upload-receipt", post(handlers::upload_featured_receipt))
        // 今日特惠
        .route("/deals-of-day", get(handlers::deals_of_day))
        .route("/deals-of-day/settings", get(handlers::deal_settings))
        .route("/deals-of-day/{request_id}/click", post(handlers::record_deal_click))
        // 推送
        .route(
            "/notifications/fcm-token",
            post(handlers::register_fcm_token).delete(handlers::delete_fcm_token),
        )
        .route("/notifications/notification-plans", get(handlers::list_notification_plans))
        .route("/notifications/notification-credit", get(handlers::notification_credit))
        .route(
            "/notifications/notification-purchases",
            get(handlers::list_notification_purchases).post(handlers::create_notification_purchase),
        )
        .route(
            "/notifications/notification-purchases/{id}/upload-receipt",
            post(handlers::upload_purchase_receipt),
        )
        .route("/notifications/send-notification", post(handlers::send_notification))
        .route("/notifications/notification-history", get(handlers::notification_history))
        // 在线人数组件
        .route("/online-users-settings", get(handlers::online_users_settings))
        // 管理后台：审核
        .route("/admin/merchant-requests", get(handlers::admin_list_merchant_requests))
        .route(
            "/admin/merchant-requests/{id}/approve",
            post(handlers::admin_approve_merchant_request),
        )
        .route(
            "/admin/merchant-requests/{id}/reject",
            post(handlers::admin_reject_merchant_request),
        )
        .route("/admin/merchants/{id}/status", put(handlers::admin_set_merchant_status))
        .route("/admin/featured-requests", get(handlers::admin_list_featured_requests))
        .route("/admin/featured-requests/{id}/activate", post(handlers::admin_activate_featured))
        .route("/admin/featured-requests/{id}/reject", post(handlers::admin_reject_featured))
        .route("/admin/deal-requests", get(handlers::admin_list_deal_requests))
        .route("/admin/deal-requests/{id}/activate", post(handlers::admin_activate_deal))
        .route("/admin/deal-requests/{id}/reject", post(handlers::admin_reject_deal))
        .route("/admin/notification-purchases", get(handlers::admin_list_purchases))
        .route(
            "/admin/notification-purchases/{id}/approve",
            post(handlers::admin_approve_purchase),
        )
        .route(
            "/admin/notification-purchases/{id}/reject",
            post(handlers::admin_reject_purchase),
        )
        .route("/admin/notifications/send", post(handlers::admin_broadcast))
        .route("/admin/notifications/history", get(handlers::admin_broadcast_history))
        // 管理后台：基础数据
        .route("/admin/governorates", post(handlers::admin_create_governorate))
        .route(
            "/admin/governorates/{id}",
            put(handlers::admin_update_governorate).delete(handlers::admin_delete_governorate),
        )
        .route("/admin/cities", post(handlers::admin_create_city))
        .route(
            "/admin/cities/{id}",
            put(handlers::admin_update_city).delete(handlers::admin_delete_city),
        )
        .route("/admin/categories", post(handlers::admin_create_category))
        .route(
            "/admin/categories/{id}",
            put(handlers::admin_update_category).delete(handlers::admin_delete_category),
        )
        .route("/admin/business-types", post(handlers::admin_create_business_type))
        .route(
            "/admin/business-types/{id}",
            put(handlers::admin_update_business_type).delete(handlers::admin_delete_business_type),
        )
        .route("/admin/exchange-rates", put(handlers::admin_upsert_exchange_rate))
        .route("/admin/exchange-rates/{id}", axum::routing::delete(handlers::admin_delete_exchange_rate))
        .route("/admin/payment-accounts", post(handlers::admin_create_payment_account))
        .route(
            "/admin/payment-accounts/{id}",
            put(handlers::admin_update_payment_account).delete(handlers::admin_delete_payment_account),
        )
        .route("/admin/featured-plans", post(handlers::admin_create_featured_plan))
        .route(
            "/admin/featured-plans/{id}",
            put(handlers::admin_update_featured_plan).delete(handlers::admin_delete_featured_plan),
        )
        .route("/admin/notification-plans", post(handlers::admin_create_notification_plan))
        .route(
            "/admin/notification-plans/{id}",
            put(handlers::admin_update_notification_plan).delete(handlers::admin_delete_notification_plan),
        )
        // 管理后台：系统配置与维护
        .route("/admin/system/configs", get(handlers::get_configs))
        .route("/admin/system/configs/update", post(handlers::update_config))
        .route("/admin/system/configs/batch", post(handlers::batch_update_configs))
        .route("/admin/maintenance/expire-promotions", post(handlers::admin_expire_promotions))
        // 应用认证中间件
        .layer(from_fn_with_state(app_state.clone(), auth_middleware))
        // 添加应用状态
        .layer(Extension(app_state.clone()));

    Router::new()
        .nest("/api/v1", api_routes)
        // 上传的文件
        .nest_service("/media", ServeDir::new(&app_state.config.media_dir))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
}

/// 启动 Web API 服务
pub fn start_web_server(app_state: AppState) -> tokio::task::JoinHandle<()> {
    let web_port = app_state.config.web_port;

    tokio::spawn(async move {
        let app = build_router(app_state);

        let web_addr = format!("0.0.0.0:{}", web_port);
        match tokio::net::TcpListener::bind(web_addr.clone()).await {
            Ok(listener) => {
                info!("🌐 API 服务: http://{}/api/v1", web_addr);
                if let Err(err) = axum::serve(listener, app).await {
                    tracing::error!("Web服务错误：{}", err);
                }
            }
            Err(err) => {
                tracing::error!("Web服务启动失败：{}", err);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::config_manager::ConfigManager;
    use crate::google_auth::GoogleVerifier;
    use crate::notifications::push::LogOnlySender;
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let db = setup_db().await;
        let config_manager = Arc::new(ConfigManager::new(db.clone()));
        config_manager.load_from_db().await.unwrap();
        AppState {
            db,
            config: Arc::new(Config::default()),
            jwt_secret: "test-secret".into(),
            config_manager,
            push: Arc::new(LogOnlySender),
            google: Arc::new(GoogleVerifier::new(reqwest::Client::new(), None, true)),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_public_route_envelope() {
        let app = build_router(test_state().await);
        let response = app
            .oneshot(Request::get("/api/v1/categories").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["data"].is_array());
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let app = build_router(test_state().await);
        let response = app
            .oneshot(Request::get("/api/v1/favorites").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_register_then_me() {
        let state = test_state().await;
        let app = build_router(state);

        let register = Request::post("/api/v1/auth/register")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"email":"Sara@Example.com","password":"secret123","full_name":"سارة"}"#,
            ))
            .unwrap();
        let response = app.clone().oneshot(register).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let me = Request::get("/api/v1/auth/me")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(me).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["email"], "sara@example.com");
    }

    #[tokio::test]
    async fn test_admin_route_forbidden_for_customer() {
        let state = test_state().await;
        let customer = create_user(&state.db, "c@tawfir.app", crate::entity::UserType::Customer).await;
        let token = crate::jwt::generate_token(
            customer.id,
            &customer.email,
            customer.user_type,
            &state.jwt_secret,
            1,
        )
        .unwrap();
        let app = build_router(state);

        let request = Request::get("/api/v1/admin/system/configs")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_batch_config_rejects_inverted_user_range() {
        let state = test_state().await;
        let admin = create_user(&state.db, "a@tawfir.app", crate::entity::UserType::Admin).await;
        let token =
            crate::jwt::generate_token(admin.id, &admin.email, admin.user_type, &state.jwt_secret, 1).unwrap();
        let config_manager = state.config_manager.clone();
        let app = build_router(state);

        let batch = |body: &'static str| {
            Request::post("/api/v1/admin/system/configs/batch")
                .header("authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(batch(
                r#"{"configs":[{"key":"online_users_min","value":400},{"key":"online_users_max","value":100}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let settings = config_manager.online_users_settings().await;
        assert_eq!((settings.min_users, settings.max_users), (25, 450));

        let response = app
            .oneshot(batch(
                r#"{"configs":[{"key":"online_users_min","value":500},{"key":"online_users_max","value":600}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let settings = config_manager.online_users_settings().await;
        assert_eq!((settings.min_users, settings.max_users), (500, 600));
    }
}
