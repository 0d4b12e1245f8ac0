//! Site settings and contact API endpoints
//!
//! - GET /api/v1/site - general settings with defaults
//! - POST /api/v1/contact - public contact form
//! - GET /api/v1/admin/settings/{key}
//! - PUT /api/v1/admin/settings/{key}
//! - GET /api/v1/admin/contacts/count

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::journalists::CountResponse;
use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::models::{Contact, ContactSubmission, GeneralSettings, SiteSetting};

pub fn settings_router() -> Router<AppState> {
    Router::new().route("/{key}", get(get_setting).put(put_setting))
}

/// GET /api/v1/site
pub async fn get_site_info(State(state): State<AppState>) -> Result<Json<GeneralSettings>, ApiError> {
    Ok(Json(state.settings_service.general().await?))
}

/// POST /api/v1/contact
pub async fn submit_contact(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<ContactSubmission>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    let contact = state.contact_service.submit(form).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/v1/admin/contacts/count
pub async fn contacts_count(State(state): State<AppState>) -> Result<Json<CountResponse>, ApiError> {
    let count = state.contact_service.count().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /api/v1/admin/settings/{key} - `null` when nothing is stored
async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Option<SiteSetting>>, ApiError> {
    Ok(Json(state.settings_service.get(&key).await?))
}

/// PUT /api/v1/admin/settings/{key} - body is the whole JSON document
async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    ApiJson(value): ApiJson<serde_json::Value>,
) -> Result<Json<SiteSetting>, ApiError> {
    Ok(Json(state.settings_service.put(&key, value).await?))
}
