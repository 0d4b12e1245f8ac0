//! Journalist invitations
//!
//! An Editor in Chief invites a journalist by email. The auth platform sends
//! the invitation; the journalist row is then upserted by email and linked to
//! the new (or already existing) account.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::InviteConfig;
use crate::models::{Journalist, JournalistRole};
use crate::platform::{AuthError, AuthProvider};

use super::journalist::{EmailUpsert, JournalistService, JournalistServiceError};

pub const MSG_METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const MSG_MISSING_CONFIG: &str =
    "Server is missing SUPABASE_URL / SUPABASE_ANON_KEY / SUPABASE_SERVICE_ROLE_KEY";
pub const MSG_MISSING_TOKEN: &str = "Missing Authorization: Bearer <token>";
pub const MSG_INVALID_SESSION: &str = "Invalid session";
pub const MSG_NO_EMAIL: &str = "Caller has no email";
pub const MSG_NOT_EIC: &str = "Only Editor in Chief can invite journalists";
pub const MSG_MISSING_FIELDS: &str = "Missing name or email";
pub const MSG_INVALID_ROLE: &str = "Invalid role";
pub const MSG_INVITED: &str = "Invite email sent";
pub const MSG_LINKED: &str =
    "User already registered; journalist record updated. They can sign in with that email.";

static LOCALHOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://localhost(:\d+)?(/|$)").expect("valid localhost pattern")
});

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("{}", MSG_MISSING_CONFIG)]
    MissingConfig,

    #[error("{}", MSG_MISSING_TOKEN)]
    MissingToken,

    #[error("{}", MSG_INVALID_SESSION)]
    InvalidSession,

    #[error("{}", MSG_NO_EMAIL)]
    CallerHasNoEmail,

    #[error("{}", MSG_NOT_EIC)]
    NotEditorInChief,

    #[error("{}", MSG_MISSING_FIELDS)]
    MissingFields,

    #[error("{}", MSG_INVALID_ROLE)]
    InvalidRole,

    /// Invite or datastore failure, carrying the upstream message
    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Invite request body. Every field is optional on the wire so a partial
/// body reaches validation instead of failing to parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

impl InviteRequest {
    /// Parse a raw body; anything unparseable counts as an empty body
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteOutcome {
    pub invited: bool,
    pub journalist: Journalist,
    pub message: String,
}

pub fn is_localhost(url: &str) -> bool {
    LOCALHOST_RE.is_match(url) || url.starts_with("http://127.0.0.1")
}

/// Pick the redirect base from candidates in priority order. Blank values are
/// skipped. A localhost URL is only chosen when no other candidate exists,
/// and never in production.
pub fn pick_redirect_base<'a, I>(candidates: I, production: bool) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut local_fallback = None;
    for candidate in candidates.into_iter().flatten() {
        let url = candidate.trim();
        if url.is_empty() {
            continue;
        }
        if !is_localhost(url) {
            return Some(url.to_string());
        }
        if local_fallback.is_none() {
            local_fallback = Some(url.to_string());
        }
    }
    if production {
        None
    } else {
        local_fallback
    }
}

/// The login page to send invitees to, derived from the chosen base
pub fn invite_redirect_target(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.contains("/admin") {
        base.to_string()
    } else {
        format!("{}/admin/login", base)
    }
}

/// Resolve the invite redirect. Candidates in priority order: configured
/// redirect, site URL, the request body's `redirectTo`, the request origin,
/// then the deployment host.
pub fn resolve_invite_redirect(
    config: &InviteConfig,
    body_redirect: Option<&str>,
    origin: Option<&str>,
) -> Option<String> {
    let deployment = config
        .deployment_url
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|host| format!("https://{}", host));
    let candidates = [
        config.redirect_to.as_deref(),
        config.site_url.as_deref(),
        body_redirect,
        origin,
        deployment.as_deref(),
    ];
    pick_redirect_base(candidates, config.production).map(|base| invite_redirect_target(&base))
}

pub struct InviteService {
    auth: Arc<dyn AuthProvider>,
    journalists: Arc<JournalistService>,
    config: InviteConfig,
}

impl InviteService {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        journalists: Arc<JournalistService>,
        config: InviteConfig,
    ) -> Self {
        Self {
            auth,
            journalists,
            config,
        }
    }

    /// Run the invite flow for the bearer of `token`
    pub async fn invite(
        &self,
        token: &str,
        request: InviteRequest,
        origin: Option<&str>,
    ) -> Result<InviteOutcome, InviteError> {
        let caller = self.auth.get_user(token).await.map_err(|e| {
            tracing::warn!("Invite caller session rejected: {}", e);
            InviteError::InvalidSession
        })?;
        if caller
            .email
            .as_deref()
            .map_or(true, |e| e.trim().is_empty())
        {
            return Err(InviteError::CallerHasNoEmail);
        }

        let journalist = self
            .journalists
            .resolve_caller(&caller)
            .await
            .map_err(|e| InviteError::Internal(anyhow::anyhow!(e)))?;
        if !journalist.as_ref().is_some_and(Journalist::is_editor_in_chief) {
            tracing::info!("Invite refused for non-EIC caller {}", caller.id);
            return Err(InviteError::NotEditorInChief);
        }

        let field = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_string();
        let name = field(&request.name);
        let email = field(&request.email);
        if name.is_empty() || email.is_empty() {
            return Err(InviteError::MissingFields);
        }
        let role_text = field(&request.role);
        let role = if role_text.is_empty() {
            JournalistRole::Contributor
        } else {
            role_text.parse().map_err(|_| InviteError::InvalidRole)?
        };
        let department = Some(field(&request.department)).filter(|d| !d.is_empty());

        let redirect = resolve_invite_redirect(&self.config, request.redirect_to.as_deref(), origin);

        let (auth_user_id, invited) =
            match self.auth.invite_user_by_email(&email, redirect.as_deref()).await {
                Ok(user) => (Some(user.id), true),
                Err(AuthError::AlreadyRegistered(_)) => {
                    let existing = self.auth.find_user_by_email(&email).await.unwrap_or_else(|e| {
                        tracing::warn!("Lookup of existing account for {} failed: {}", email, e);
                        None
                    });
                    (existing.map(|u| u.id), false)
                }
                Err(e) => return Err(InviteError::Upstream(e.to_string())),
            };

        let journalist = self
            .journalists
            .upsert_by_email(EmailUpsert {
                name,
                email,
                role,
                department,
                auth_user_id,
            })
            .await
            .map_err(|e| match e {
                JournalistServiceError::Upstream(msg) => InviteError::Upstream(msg),
                other => InviteError::Upstream(other.to_string()),
            })?;

        tracing::info!(
            "Journalist {} {} by {}",
            journalist.id,
            if invited { "invited" } else { "linked to existing account" },
            caller.id
        );
        Ok(InviteOutcome {
            invited,
            journalist,
            message: if invited { MSG_INVITED } else { MSG_LINKED }.to_string(),
        })
    }
}
