//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the flat `{"error", "code"}` error body
//! - Authentication (bearer token or session cookie) for the admin API
//! - The admin page guard that redirects to the login screen

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxContactRepository, SqlxJournalistRepository, SqlxMediaRepository,
    SqlxSettingsRepository,
};
use crate::db::DynDatabasePool;
use crate::models::Journalist;
use crate::platform::{AuthProvider, AuthUser, ObjectStorage};
use crate::services::{
    invite, AnalyticsService, ArticleService, ArticleServiceError, ContactService,
    ContactServiceError, InviteError, InviteService, JournalistService, JournalistServiceError,
    LoginRateLimiter, MediaService, MediaServiceError, MemorySessionStore, RateLimited,
    SessionStore, SettingsService, SettingsServiceError,
};
use crate::theme::ThemeEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Auth platform client; absent while platform credentials are incomplete
    pub auth: Option<Arc<dyn AuthProvider>>,
    pub sessions: Arc<dyn SessionStore>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub article_service: Arc<ArticleService>,
    pub journalist_service: Arc<JournalistService>,
    pub media_service: Arc<MediaService>,
    pub settings_service: Arc<SettingsService>,
    pub contact_service: Arc<ContactService>,
    pub analytics_service: Arc<AnalyticsService>,
    /// Present only when the platform configuration is complete
    pub invite_service: Option<Arc<InviteService>>,
    pub theme: Arc<ThemeEngine>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(
        pool: DynDatabasePool,
        config: Config,
        auth: Option<Arc<dyn AuthProvider>>,
        storage: Arc<dyn ObjectStorage>,
    ) -> anyhow::Result<Self> {
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let journalist_repo = SqlxJournalistRepository::boxed(pool.clone());
        let contact_repo = SqlxContactRepository::boxed(pool.clone());

        let article_service = Arc::new(
            ArticleService::new(article_repo.clone())
                .with_publish_restriction(config.editorial.restrict_publishing),
        );
        let journalist_service =
            Arc::new(JournalistService::new(journalist_repo.clone(), auth.clone()));
        let media_service = Arc::new(MediaService::new(
            SqlxMediaRepository::boxed(pool.clone()),
            storage,
            config.upload.clone(),
        ));
        let settings_service = Arc::new(SettingsService::new(SqlxSettingsRepository::boxed(
            pool.clone(),
        )));
        let contact_service = Arc::new(ContactService::new(contact_repo.clone()));
        let analytics_service = Arc::new(AnalyticsService::new(
            article_repo,
            journalist_repo,
            contact_repo,
        ));

        let invite_service = match (&auth, config.platform.is_complete()) {
            (Some(auth), true) => Some(Arc::new(InviteService::new(
                auth.clone(),
                journalist_service.clone(),
                config.invite.clone(),
            ))),
            _ => None,
        };

        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(
            Duration::from_secs(config.session.ttl_seconds.max(60)),
        ));

        Ok(Self {
            config: Arc::new(config),
            auth,
            sessions,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            article_service,
            journalist_service,
            media_service,
            settings_service,
            contact_service,
            analytics_service,
            invite_service,
            theme: Arc::new(ThemeEngine::new()?),
        })
    }

    /// The journalist record behind a signed-in user
    pub async fn caller_journalist(&self, user: &AuthUser) -> Result<Option<Journalist>, ApiError> {
        Ok(self.journalist_service.resolve_caller(user).await?)
    }

    /// Whether the signed-in user may publish (Editor in Chief)
    pub async fn can_publish(&self, user: &AuthUser) -> Result<bool, ApiError> {
        Ok(self
            .caller_journalist(user)
            .await?
            .is_some_and(|j| j.is_editor_in_chief()))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new("METHOD_NOT_ALLOWED", invite::MSG_METHOD_NOT_ALLOWED)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Auth, storage, or datastore refusal on a privileged path
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_ERROR", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMIT", message)
    }

    pub fn missing_config() -> Self {
        Self::new("MISSING_CONFIG", invite::MSG_MISSING_CONFIG)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "UPSTREAM_ERROR" => StatusCode::BAD_REQUEST,
            "METHOD_NOT_ALLOWED" => StatusCode::METHOD_NOT_ALLOWED,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    tracing::error!("Internal error: {}", err);
    ApiError::internal_error(err.to_string())
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        internal(format!("{:#}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(msg) => ApiError::not_found(msg),
            ArticleServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ArticleServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ArticleServiceError::Conflict(msg) => ApiError::conflict(msg),
            ArticleServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<JournalistServiceError> for ApiError {
    fn from(err: JournalistServiceError) -> Self {
        match err {
            JournalistServiceError::NotFound(msg) => ApiError::not_found(msg),
            JournalistServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            JournalistServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            JournalistServiceError::MissingConfig => ApiError::missing_config(),
            JournalistServiceError::Upstream(msg) => ApiError::upstream(msg),
            JournalistServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        let message = err.to_string();
        match err {
            InviteError::MissingConfig => ApiError::missing_config(),
            InviteError::MissingToken | InviteError::InvalidSession => {
                ApiError::unauthorized(message)
            }
            InviteError::NotEditorInChief => ApiError::forbidden(message),
            InviteError::CallerHasNoEmail
            | InviteError::MissingFields
            | InviteError::InvalidRole => ApiError::validation_error(message),
            InviteError::Upstream(msg) => ApiError::upstream(msg),
            InviteError::Internal(e) => e.into(),
        }
    }
}

impl From<MediaServiceError> for ApiError {
    fn from(err: MediaServiceError) -> Self {
        match err {
            MediaServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            MediaServiceError::Upstream(msg) => ApiError::upstream(msg),
            MediaServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(err: SettingsServiceError) -> Self {
        match err {
            SettingsServiceError::InvalidKey(_) | SettingsServiceError::InvalidValue(_) => {
                ApiError::validation_error(err.to_string())
            }
            SettingsServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<ContactServiceError> for ApiError {
    fn from(err: ContactServiceError) -> Self {
        match err {
            ContactServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ContactServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<RateLimited> for ApiError {
    fn from(err: RateLimited) -> Self {
        ApiError::rate_limited(err.to_string())
    }
}

/// JSON body extractor whose rejections use the API error body
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: AuthUser,
    /// Platform access token, usable for sign-out
    pub access_token: String,
    /// Cookie session id when the request came from the admin console
    pub session_id: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Token from `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Value of the named cookie
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|c| c.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Client address from proxy headers
pub fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim);
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim);
    forwarded.or(real_ip).and_then(|ip| ip.parse().ok())
}

/// Resolve the caller from a bearer token, falling back to the session cookie
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    if let Some(token) = extract_bearer_token(headers) {
        let auth = state
            .auth
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized(invite::MSG_INVALID_SESSION))?;
        let user = auth.get_user(&token).await.map_err(|e| {
            tracing::debug!("Bearer token rejected: {}", e);
            ApiError::unauthorized(invite::MSG_INVALID_SESSION)
        })?;
        return Ok(AuthenticatedUser {
            user,
            access_token: token,
            session_id: None,
        });
    }

    if let Some(id) = extract_cookie(headers, &state.config.session.cookie_name) {
        let session = state
            .sessions
            .get(&id)
            .await
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;
        return Ok(AuthenticatedUser {
            user: session.user,
            access_token: session.access_token,
            session_id: Some(id),
        });
    }

    Err(ApiError::unauthorized("Missing authentication token"))
}

/// Authentication middleware for the admin JSON API
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Guard for admin HTML pages: no live session means a trip to the login page
pub async fn require_admin_page(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(_) => Redirect::to("/admin/login").into_response(),
    }
}

/// `Set-Cookie` value carrying a session id
pub fn session_cookie(name: &str, id: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name,
        id,
        max_age_secs.max(0)
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}
