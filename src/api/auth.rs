//! Authentication API endpoints
//!
//! Sign-in is delegated to the auth platform; the resulting tokens are kept in
//! the session store and the browser only holds an opaque session cookie.
//!
//! - POST /api/v1/auth/login
//! - POST /api/v1/auth/recover - email a password reset link
//! - POST /api/v1/auth/logout
//! - GET /api/v1/auth/session - user, journalist record, and `can_publish`

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::api::middleware::{
    clear_session_cookie, extract_ip_address, session_cookie, ApiError, ApiJson, AppState,
    AuthenticatedUser,
};
use crate::models::Journalist;
use crate::platform::{AuthError, AuthUser};
use crate::services::invite::resolve_invite_redirect;
use crate::services::AdminSession;

pub const MSG_RESET_SENT: &str = "If that email has an account, a reset link is on its way.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecoverRequest {
    pub email: String,
    pub redirect_to: Option<String>,
}

/// Who is signed in, as the console needs it
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: AuthUser,
    pub journalist: Option<Journalist>,
    pub can_publish: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    /// Platform access token for `Authorization: Bearer` use
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/recover", post(recover))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/session", get(current_session))
}

/// Password sign-in shared by the JSON API and the login form.
///
/// Rate limits apply before the platform is asked; a rejected password
/// counts against the email's failure window.
pub async fn sign_in(
    state: &AppState,
    email: &str,
    password: &str,
    ip: Option<IpAddr>,
) -> Result<AdminSession, ApiError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::validation_error("Email and password are required"));
    }
    let auth = state.auth.as_ref().ok_or_else(ApiError::missing_config)?;
    state.rate_limiter.check(email, ip).await?;

    match auth.sign_in_with_password(email, password).await {
        Ok(tokens) => {
            state.rate_limiter.record_success(email).await;
            let session = AdminSession::from_auth(
                tokens,
                Duration::from_secs(state.config.session.ttl_seconds),
            );
            state.sessions.insert(session.clone()).await;
            tracing::info!("User {} signed in", session.user.id);
            Ok(session)
        }
        Err(AuthError::InvalidCredentials) => {
            state.rate_limiter.record_failure(email).await;
            tracing::warn!("Failed sign-in for {}", email);
            Err(ApiError::unauthorized("Invalid login credentials"))
        }
        Err(e) => {
            tracing::warn!("Sign-in for {} failed upstream: {}", email, e);
            Err(ApiError::upstream(e.to_string()))
        }
    }
}

/// `Set-Cookie` header for a fresh session
pub fn session_cookie_header(state: &AppState, session: &AdminSession) -> Result<HeaderValue, ApiError> {
    let max_age = (session.expires_at - Utc::now()).num_seconds();
    HeaderValue::from_str(&session_cookie(
        &state.config.session.cookie_name,
        &session.id,
        max_age,
    ))
    .map_err(|e| ApiError::internal_error(format!("Invalid session cookie: {}", e)))
}

/// End a session: forget it locally, then revoke the platform token
pub async fn end_session(state: &AppState, user: &AuthenticatedUser) {
    if let Some(id) = &user.session_id {
        state.sessions.remove(id).await;
    }
    if let Some(auth) = &state.auth {
        if let Err(e) = auth.sign_out(&user.access_token).await {
            tracing::warn!("Platform sign-out failed for {}: {}", user.user.id, e);
        }
    }
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = sign_in(
        &state,
        &body.email,
        &body.password,
        extract_ip_address(&headers),
    )
    .await?;
    let cookie = session_cookie_header(&state, &session)?;

    let journalist = state.caller_journalist(&session.user).await?;
    let can_publish = journalist.as_ref().is_some_and(Journalist::is_editor_in_chief);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, cookie);
    Ok((
        response_headers,
        Json(LoginResponse {
            session: SessionResponse {
                user: session.user.clone(),
                journalist,
                can_publish,
            },
            access_token: session.access_token,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/v1/auth/recover
///
/// Answers the same way whether or not the email has an account.
async fn recover(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<RecoverRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = body.email.trim();
    if email.is_empty() {
        return Err(ApiError::validation_error("Email is required"));
    }
    let auth = state.auth.as_ref().ok_or_else(ApiError::missing_config)?;

    let origin = headers.get(header::ORIGIN).and_then(|h| h.to_str().ok());
    let redirect = resolve_invite_redirect(&state.config.invite, body.redirect_to.as_deref(), origin);
    if let Err(e) = auth.send_password_reset(email, redirect.as_deref()).await {
        tracing::warn!("Password reset for {} failed: {}", email, e);
    }

    Ok(Json(MessageResponse {
        message: MSG_RESET_SENT.to_string(),
    }))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    end_session(&state, &user).await;

    let mut response_headers = HeaderMap::new();
    if let Ok(clear) = HeaderValue::from_str(&clear_session_cookie(&state.config.session.cookie_name)) {
        response_headers.insert(header::SET_COOKIE, clear);
    }
    (StatusCode::NO_CONTENT, response_headers)
}

/// GET /api/v1/auth/session
async fn current_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SessionResponse>, ApiError> {
    let journalist = state.caller_journalist(&user.user).await?;
    let can_publish = journalist.as_ref().is_some_and(Journalist::is_editor_in_chief);
    Ok(Json(SessionResponse {
        user: user.user,
        journalist,
        can_publish,
    }))
}
