use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::OwnerId;
use crate::services::error::LifecycleError;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AccessStartUrlResponse {
    pub start: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadUrlResponse {
    pub url: String,
}

#[derive(Serialize, Deserialize, ToSchema, Default)]
pub struct UploadUrlsRequest {
    #[serde(rename = "urlCount")]
    pub url_count: Option<usize>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadUrlsResponse {
    pub urls: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DeleteTempResponse {
    pub discarded: usize,
}

#[utoipa::path(
    post,
    path = "/access-start-url",
    responses(
        (status = 200, description = "Base URL for reading confirmed images", body = AccessStartUrlResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "images"
)]
pub async fn access_start_url(
    State(state): State<AppState>,
    OwnerId(_owner): OwnerId,
) -> Json<AccessStartUrlResponse> {
    Json(AccessStartUrlResponse {
        start: state.lifecycle.access_start_url().to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/get-upload-url",
    responses(
        (status = 200, description = "Presigned upload URL", body = UploadUrlResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "images"
)]
pub async fn get_upload_url(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
) -> Result<Json<UploadUrlResponse>, AppError> {
    state.lifecycle.clean_up(&owner).await?;
    let url = state.lifecycle.generate_upload_url(&owner).await?;
    Ok(Json(UploadUrlResponse { url }))
}

#[utoipa::path(
    post,
    path = "/get-upload-url-multiple",
    request_body = UploadUrlsRequest,
    responses(
        (status = 200, description = "Presigned upload URLs in request order", body = UploadUrlsResponse),
        (status = 400, description = "urlCount missing or above the limit"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "images"
)]
pub async fn get_upload_url_multiple(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    body: Option<Json<UploadUrlsRequest>>,
) -> Result<Json<UploadUrlsResponse>, AppError> {
    let count = body
        .and_then(|Json(req)| req.url_count)
        .ok_or_else(|| LifecycleError::ArgumentRequired("urlCount".to_string()))?;

    state.lifecycle.clean_up(&owner).await?;
    let urls = state.lifecycle.generate_upload_urls(&owner, count).await?;
    Ok(Json(UploadUrlsResponse { urls }))
}

#[utoipa::path(
    post,
    path = "/delete-temp",
    responses(
        (status = 200, description = "Pending reservations discarded", body = DeleteTempResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "images"
)]
pub async fn delete_temp(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
) -> Result<Json<DeleteTempResponse>, AppError> {
    let discarded = state.lifecycle.clean_up(&owner).await?;
    Ok(Json(DeleteTempResponse { discarded }))
}
