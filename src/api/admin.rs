//! Admin aggregate endpoints
//!
//! - GET /api/v1/admin/dashboard - status counts, recent articles, latest published
//! - GET /api/v1/admin/analytics - counts plus 14-day and category breakdowns

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState};
use crate::api::site::contacts_count;
use crate::services::{Analytics, Dashboard};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/analytics", get(analytics))
        .route("/contacts/count", get(contacts_count))
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.analytics_service.dashboard().await?))
}

async fn analytics(State(state): State<AppState>) -> Result<Json<Analytics>, ApiError> {
    Ok(Json(
        state
            .analytics_service
            .analytics(chrono::Utc::now())
            .await?,
    ))
}
