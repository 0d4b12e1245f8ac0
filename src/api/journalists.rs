//! Journalist API endpoints
//!
//! - GET /api/v1/journalists - public roster (Active, by name)
//! - GET /api/v1/admin/journalists - everyone, newest first
//! - GET /api/v1/admin/journalists/count
//! - GET /api/v1/admin/journalists/me
//! - POST /api/v1/admin/journalists - create (Editor in Chief)
//! - PUT /api/v1/admin/journalists - upsert by id (Editor in Chief)
//! - POST /api/v1/admin/journalists/accounts - create with a login account

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Journalist, JournalistInput, JournalistUpsert};
use crate::services::AccountInput;

#[derive(Debug, Serialize)]
pub struct JournalistListResponse {
    pub journalists: Vec<Journalist>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_active))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_journalist).put(upsert_journalist))
        .route("/count", get(journalist_count))
        .route("/me", get(current_journalist))
        .route("/accounts", post(create_with_account))
}

async fn list_active(
    State(state): State<AppState>,
) -> Result<Json<JournalistListResponse>, ApiError> {
    let journalists = state.journalist_service.list_active().await?;
    Ok(Json(JournalistListResponse { journalists }))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<JournalistListResponse>, ApiError> {
    let journalists = state.journalist_service.list_all().await?;
    Ok(Json(JournalistListResponse { journalists }))
}

async fn journalist_count(State(state): State<AppState>) -> Result<Json<CountResponse>, ApiError> {
    let count = state.journalist_service.count().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /api/v1/admin/journalists/me - `null` when the account has no roster entry
async fn current_journalist(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Option<Journalist>>, ApiError> {
    Ok(Json(state.caller_journalist(&user.user).await?))
}

async fn create_journalist(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<JournalistInput>,
) -> Result<(StatusCode, Json<Journalist>), ApiError> {
    let caller = state.caller_journalist(&user.user).await?;
    let journalist = state
        .journalist_service
        .create(caller.as_ref(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(journalist)))
}

async fn upsert_journalist(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(upsert): ApiJson<JournalistUpsert>,
) -> Result<Json<Journalist>, ApiError> {
    let caller = state.caller_journalist(&user.user).await?;
    Ok(Json(
        state
            .journalist_service
            .upsert(caller.as_ref(), upsert)
            .await?,
    ))
}

/// POST /api/v1/admin/journalists/accounts - `{email, password, name, role, department?}`
async fn create_with_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<AccountInput>,
) -> Result<(StatusCode, Json<Journalist>), ApiError> {
    let caller = state.caller_journalist(&user.user).await?;
    let journalist = state
        .journalist_service
        .create_with_account(caller.as_ref(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(journalist)))
}
