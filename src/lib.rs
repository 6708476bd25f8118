pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod mq;
pub mod services;
pub mod utils;

use crate::config::ServiceConfig;
use crate::services::lifecycle::LifecycleManager;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::images::access_start_url,
        api::handlers::images::get_upload_url,
        api::handlers::images::get_upload_url_multiple,
        api::handlers::images::delete_temp,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::images::AccessStartUrlResponse,
            api::handlers::images::UploadUrlResponse,
            api::handlers::images::UploadUrlsRequest,
            api::handlers::images::UploadUrlsResponse,
            api::handlers::images::DeleteTempResponse,
        )
    ),
    tags(
        (name = "images", description = "Temporary image upload reservations"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub lifecycle: Arc<LifecycleManager>,
    pub config: ServiceConfig,
}

pub fn create_app(state: AppState) -> Router {
    let authed = Router::new()
        .route(
            "/access-start-url",
            post(api::handlers::images::access_start_url),
        )
        .route("/get-upload-url", post(api::handlers::images::get_upload_url))
        .route(
            "/get-upload-url-multiple",
            post(api::handlers::images::get_upload_url_multiple),
        )
        .route("/delete-temp", post(api::handlers::images::delete_temp))
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .merge(authed)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
