//! Clients for the hosted platform: the auth service and object storage.
//!
//! Both sit behind traits so services and handlers can be exercised with
//! in-process fakes.

pub mod auth;
pub mod storage;

pub use auth::{AuthError, AuthProvider, AuthSession, AuthUser, PlatformAuth};
pub use storage::{
    create_storage, storage_object_path, LocalStorage, ObjectStorage, PlatformStorage,
    StorageError, StoredObject,
};

use std::time::Duration;

/// Shared HTTP client for platform calls
pub fn http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Pull a human-readable message out of a platform error body.
///
/// The services answer with one of `msg`, `message`, `error_description` or
/// `error`; anything else falls back to the raw text.
pub(crate) fn upstream_message(body: &str) -> (Option<String>, String) {
    #[derive(serde::Deserialize, Default)]
    struct ErrorBody {
        error_code: Option<String>,
        msg: Option<String>,
        message: Option<String>,
        error_description: Option<String>,
        error: Option<serde_json::Value>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let error_text = parsed.error.as_ref().and_then(|e| e.as_str().map(str::to_string));
    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(error_text)
        .unwrap_or_else(|| body.trim().to_string());
    (parsed.error_code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_variants() {
        let (code, msg) = upstream_message(
            r#"{"code":422,"error_code":"email_exists","msg":"A user with this email address has already been registered"}"#,
        );
        assert_eq!(code.as_deref(), Some("email_exists"));
        assert!(msg.starts_with("A user with this email"));

        let (_, msg) = upstream_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
        assert_eq!(msg, "Invalid login credentials");

        let (_, msg) = upstream_message(r#"{"statusCode":"404","error":"Bucket not found","message":"Bucket not found"}"#);
        assert_eq!(msg, "Bucket not found");

        let (code, msg) = upstream_message("Bad Gateway");
        assert!(code.is_none());
        assert_eq!(msg, "Bad Gateway");
    }
}
