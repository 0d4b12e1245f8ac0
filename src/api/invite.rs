//! Privileged invite endpoint
//!
//! `/api/invite-journalist` lets an Editor in Chief invite a journalist by
//! email. It answers every method itself so the error bodies match:
//! `OPTIONS` is a bare 204 preflight, anything but `POST` is a 405.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::api::middleware::{extract_bearer_token, ApiError, AppState};
use crate::services::{InviteError, InviteRequest};

/// /api/invite-journalist
pub async fn invite_journalist(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight();
    }
    if method != Method::POST {
        return ApiError::method_not_allowed().into_response();
    }

    match handle_invite(&state, &headers, &body).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn handle_invite(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<crate::services::InviteOutcome, InviteError> {
    let service = state.invite_service.as_ref().ok_or(InviteError::MissingConfig)?;
    let token = extract_bearer_token(headers).ok_or(InviteError::MissingToken)?;
    let origin = headers.get(header::ORIGIN).and_then(|h| h.to_str().ok());
    service
        .invite(&token, InviteRequest::from_body(body), origin)
        .await
}

fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("authorization, x-client-info, apikey, content-type"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("POST, OPTIONS"),
            ),
        ],
    )
        .into_response()
}
