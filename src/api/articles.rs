//! Article API endpoints
//!
//! Public (published only):
//! - GET /api/v1/articles?limit=&category=
//! - GET /api/v1/articles/{id}
//! - GET /api/v1/articles/slug/{slug}
//!
//! Admin:
//! - GET /api/v1/admin/articles?limit=
//! - GET /api/v1/admin/articles/counts
//! - GET /api/v1/admin/articles/latest
//! - GET /api/v1/admin/articles/{id}
//! - POST /api/v1/admin/articles (save)
//! - PATCH /api/v1/admin/articles/{id} (partial update)
//! - PUT /api/v1/admin/articles/{id}/status

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Article, ArticleCounts, ArticlePatch, ArticleStatus, SaveArticleInput};

/// Query parameters for listing articles
#[derive(Debug, Default, Deserialize)]
pub struct ListArticlesQuery {
    pub limit: Option<i64>,
    /// Public lists only
    pub category: Option<String>,
}

/// Response for article list
#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ArticleStatus,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/slug/{slug}", get(get_published_by_slug))
        .route("/{id}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recent).post(save_article))
        .route("/counts", get(article_counts))
        .route("/latest", get(latest_published))
        .route("/{id}", get(get_article).patch(update_article))
        .route("/{id}/status", put(set_article_status))
}

/// GET /api/v1/articles
async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<ArticleListResponse>, ApiError> {
    let articles = state
        .article_service
        .list_published(query.category.as_deref(), query.limit)
        .await?;
    Ok(Json(ArticleListResponse { articles }))
}

/// GET /api/v1/articles/{id} - id, falling back to slug
async fn get_published(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    state
        .article_service
        .get_published(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Article not found"))
}

async fn get_published_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Article>, ApiError> {
    state
        .article_service
        .get_published_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Article not found"))
}

/// GET /api/v1/admin/articles - every status, newest first
async fn list_recent(
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<ArticleListResponse>, ApiError> {
    let articles = state.article_service.list_recent(query.limit).await?;
    Ok(Json(ArticleListResponse { articles }))
}

async fn article_counts(State(state): State<AppState>) -> Result<Json<ArticleCounts>, ApiError> {
    Ok(Json(state.article_service.counts().await?))
}

/// GET /api/v1/admin/articles/latest - `null` when nothing is published
async fn latest_published(
    State(state): State<AppState>,
) -> Result<Json<Option<Article>>, ApiError> {
    Ok(Json(state.article_service.latest_published().await?))
}

async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    state
        .article_service
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Article not found"))
}

/// POST /api/v1/admin/articles - create, or overwrite the article with `id`
async fn save_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<SaveArticleInput>,
) -> Result<Json<Article>, ApiError> {
    let can_publish = state.can_publish(&user.user).await?;
    Ok(Json(state.article_service.save(input, can_publish).await?))
}

/// PATCH /api/v1/admin/articles/{id}
async fn update_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ArticlePatch>,
) -> Result<Json<Article>, ApiError> {
    let can_publish = state.can_publish(&user.user).await?;
    Ok(Json(state.article_service.update(&id, patch, can_publish).await?))
}

/// PUT /api/v1/admin/articles/{id}/status
async fn set_article_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Article>, ApiError> {
    let can_publish = state.can_publish(&user.user).await?;
    Ok(Json(
        state
            .article_service
            .set_status(&id, body.status, can_publish)
            .await?,
    ))
}
