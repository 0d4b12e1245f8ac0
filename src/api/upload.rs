//! Media API endpoints
//!
//! - GET /api/v1/admin/media?limit= - media library, newest first
//! - POST /api/v1/admin/media - upload into the library (multipart `file`)
//! - POST /api/v1/admin/upload/image - featured image for an article

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::MediaItem;
use crate::services::UploadedFile;

#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub media: Vec<MediaItem>,
}

/// Response for a featured image upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub path: String,
    pub url: String,
}

pub fn media_router() -> Router<AppState> {
    Router::new().route("/", get(list_media).post(upload_media))
}

pub fn upload_router() -> Router<AppState> {
    Router::new().route("/image", post(upload_image))
}

async fn list_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<MediaListResponse>, ApiError> {
    let media = state.media_service.list(query.limit).await?;
    Ok(Json(MediaListResponse { media }))
}

/// POST /api/v1/admin/media
///
/// Accepts multipart/form-data with a single file field named "file".
async fn upload_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MediaItem>), ApiError> {
    let file = read_file_field(multipart).await?;
    let uploaded_by = state.caller_journalist(&user.user).await?.map(|j| j.id);
    let item = state.media_service.upload_media(file, uploaded_by).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /api/v1/admin/upload/image
async fn upload_image(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = read_file_field(multipart).await?;
    let stored = state.media_service.upload_article_image(file).await?;
    Ok(Json(UploadResponse {
        path: stored.path,
        url: stored.public_url,
    }))
}

/// Pull the field named "file" out of a multipart body
async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "file".to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::validation_error("No file provided"))
}
