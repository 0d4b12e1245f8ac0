//! Auth platform client
//!
//! `PlatformAuth` speaks the hosted auth REST API (`/auth/v1/...`). User-facing
//! calls (session lookup, sign-in, sign-out) use the anon key; account
//! administration (invite, create, delete, lookup by email) uses the
//! service-role key.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PlatformCredentials;

use super::upstream_message;

/// Page size used when scanning the user directory by email
const USER_PAGE_SIZE: usize = 200;
/// Upper bound on directory pages scanned for one lookup
const MAX_USER_PAGES: usize = 50;

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token was missing, expired, or revoked
    #[error("Invalid session")]
    InvalidSession,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Invite or create hit an existing account
    #[error("{0}")]
    AlreadyRegistered(String),

    /// Any other non-success answer; the message is the platform's own
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// An account on the auth platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Tokens returned by a password sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

/// Operations the newsroom needs from the auth platform
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve an access token to its user
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<AuthSession, AuthError>;

    /// Revoke the token's session
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Send an invitation email; the account is created unconfirmed
    async fn invite_user_by_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<AuthUser, AuthError>;

    /// Case-insensitive search of the user directory
    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError>;

    /// Create an account with a password and its email already confirmed
    async fn create_user(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), AuthError>;

    /// Email a password-reset link
    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError>;
}

/// True when an upstream failure means "this email already has an account"
pub fn is_already_registered(error_code: Option<&str>, message: &str) -> bool {
    if matches!(error_code, Some("email_exists") | Some("user_already_exists")) {
        return true;
    }
    let lower = message.to_lowercase();
    lower.contains("already") && (lower.contains("registered") || lower.contains("exists"))
}

/// Auth REST client
pub struct PlatformAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl PlatformAuth {
    pub fn new(client: reqwest::Client, credentials: &PlatformCredentials) -> Self {
        Self {
            client,
            base_url: format!("{}/auth/v1", credentials.url),
            anon_key: credentials.anon_key.clone(),
            service_role_key: credentials.service_role_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request carrying the anon key and a user's access token
    fn as_user(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    fn as_anon(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    fn as_service(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    /// Turn a non-success response into an `AuthError`
    async fn check(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let (code, message) = upstream_message(&body);
        if is_already_registered(code.as_deref(), &message) {
            return Err(AuthError::AlreadyRegistered(message));
        }
        tracing::warn!("Auth platform answered {}: {}", status, message);
        Err(AuthError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<AuthUser>,
}

#[async_trait]
impl AuthProvider for PlatformAuth {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .as_user(self.client.get(self.url("/user")), access_token)
            .send()
            .await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(AuthError::InvalidSession);
        }
        Ok(Self::check(response).await?.json().await?)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let response = self
            .as_anon(self.client.post(self.url("/token")))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        if response.status() == StatusCode::BAD_REQUEST {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Self::check(response).await?.json().await?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .as_user(self.client.post(self.url("/logout")), access_token)
            .send()
            .await?;
        // An already-dead token counts as signed out.
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn invite_user_by_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        let mut request = self
            .as_service(self.client.post(self.url("/invite")))
            .json(&serde_json::json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = request.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        let wanted = email.trim().to_lowercase();
        for page in 1..=MAX_USER_PAGES {
            let response = self
                .as_service(self.client.get(self.url("/admin/users")))
                .query(&[("page", page), ("per_page", USER_PAGE_SIZE)])
                .send()
                .await?;
            let batch: UserPage = Self::check(response).await?.json().await?;
            let len = batch.users.len();

            if let Some(user) = batch.users.into_iter().find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.trim().to_lowercase() == wanted)
            }) {
                return Ok(Some(user));
            }
            if len < USER_PAGE_SIZE {
                break;
            }
        }
        Ok(None)
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .as_service(self.client.post(self.url("/admin/users")))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        let response = self
            .as_service(
                self.client
                    .delete(self.url(&format!("/admin/users/{}", urlencoding::encode(user_id)))),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let mut request = self
            .as_anon(self.client.post(self.url("/recover")))
            .json(&serde_json::json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        Self::check(request.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PlatformAuth {
        let credentials = PlatformCredentials {
            url: server.uri(),
            anon_key: "anon".into(),
            service_role_key: "service".into(),
        };
        PlatformAuth::new(reqwest::Client::new(), &credentials)
    }

    #[test]
    fn test_already_registered_detection() {
        assert!(is_already_registered(Some("email_exists"), "whatever"));
        assert!(is_already_registered(None, "User already registered"));
        assert!(is_already_registered(None, "A user with this email already exists"));
        assert!(!is_already_registered(None, "Email rate limit exceeded"));
        assert!(!is_already_registered(None, "already"));
    }

    #[tokio::test]
    async fn test_get_user_sends_token_and_anon_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1", "email": "eic@school.edu", "aud": "authenticated"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "bad jwt"})))
            .mount(&server)
            .await;

        let auth = client_for(&server);
        let user = auth.get_user("tok-1").await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("eic@school.edu"));

        assert!(matches!(auth.get_user("stale").await, Err(AuthError::InvalidSession)));
    }

    #[tokio::test]
    async fn test_invite_uses_service_key_and_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/invite"))
            .and(header("authorization", "Bearer service"))
            .and(query_param("redirect_to", "https://news.example/admin/login"))
            .and(body_partial_json(json!({"email": "new@school.edu"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new-id", "email": "new@school.edu"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server)
            .invite_user_by_email("new@school.edu", Some("https://news.example/admin/login"))
            .await
            .unwrap();
        assert_eq!(user.id, "new-id");
    }

    #[tokio::test]
    async fn test_invite_existing_account_maps_to_already_registered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/invite"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "code": 422,
                "error_code": "email_exists",
                "msg": "A user with this email address has already been registered"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .invite_user_by_email("old@school.edu", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn test_other_invite_failure_keeps_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/invite"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "msg": "Email rate limit exceeded"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .invite_user_by_email("x@school.edu", None)
            .await
            .unwrap_err();
        match err {
            AuthError::Upstream { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Email rate limit exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_find_user_by_email_is_case_insensitive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/admin/users"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    {"id": "a", "email": "someone@school.edu"},
                    {"id": "b", "email": "Old@School.edu"}
                ]
            })))
            .mount(&server)
            .await;

        let auth = client_for(&server);
        let found = auth.find_user_by_email("old@school.edu").await.unwrap();
        assert_eq!(found.map(|u| u.id).as_deref(), Some("b"));
        assert!(auth.find_user_by_email("ghost@school.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_and_bad_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(body_partial_json(json!({"password": "right"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "user": {"id": "u1", "email": "eic@school.edu"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant", "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let auth = client_for(&server);
        let session = auth.sign_in_with_password("eic@school.edu", "right").await.unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.user.id, "u1");

        assert!(matches!(
            auth.sign_in_with_password("eic@school.edu", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_create_and_delete_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/admin/users"))
            .and(body_partial_json(json!({"email_confirm": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "created", "email": "c@school.edu"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/auth/v1/admin/users/created"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let auth = client_for(&server);
        let user = auth.create_user("c@school.edu", "s3cret!").await.unwrap();
        auth.delete_user(&user.id).await.unwrap();
    }
}
