//! Object storage for uploaded media
//!
//! Objects live at `{folder}/{millis}-{name}` inside one public bucket.
//! `PlatformStorage` talks to the hosted storage REST API; `LocalStorage`
//! writes under a directory the server exposes at `/uploads`.

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

use crate::config::{Config, PlatformCredentials, StorageDriver};

use super::upstream_message;

/// Cache lifetime sent with every uploaded object, in seconds
pub const CACHE_CONTROL_SECS: u32 = 3600;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),
}

/// Where an upload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Bucket every object is written to
    fn bucket(&self) -> &str;

    /// Store `bytes` at `path`, replacing any existing object
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    fn public_url(&self, path: &str) -> String;

    /// Create the public bucket if it does not exist. Returns true when it
    /// was created by this call.
    async fn ensure_bucket(&self) -> Result<bool, StorageError>;
}

/// Object path for an upload: `{folder}/{millis}-{file name}` with whitespace
/// runs turned into `-`. Path separators in the name are replaced so the
/// object always lands directly inside `folder`.
pub fn storage_object_path(folder: &str, file_name: &str, millis: i64) -> String {
    let mut name = String::with_capacity(file_name.len());
    let mut in_space = false;
    for c in file_name.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                name.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        name.push(if c == '/' || c == '\\' { '-' } else { c });
    }
    if name.is_empty() {
        name.push_str("file");
    }
    format!("{}/{}-{}", folder.trim_matches('/'), millis, name)
}

/// Build the configured storage backend. Platform storage without complete
/// credentials falls back to the local directory.
pub fn create_storage(config: &Config, client: reqwest::Client) -> Arc<dyn ObjectStorage> {
    match (config.storage.driver, config.platform.credentials()) {
        (StorageDriver::Platform, Some(credentials)) => Arc::new(PlatformStorage::new(
            client,
            &credentials,
            &config.storage.bucket,
        )),
        (StorageDriver::Platform, None) => {
            tracing::warn!(
                "Platform storage selected but credentials are incomplete; storing uploads in {}",
                config.storage.local_path.display()
            );
            Arc::new(LocalStorage::new(&config.storage.local_path, &config.storage.bucket))
        }
        (StorageDriver::Local, _) => {
            Arc::new(LocalStorage::new(&config.storage.local_path, &config.storage.bucket))
        }
    }
}

/// Storage REST client
pub struct PlatformStorage {
    client: reqwest::Client,
    base_url: String,
    service_role_key: String,
    bucket: String,
}

impl PlatformStorage {
    pub fn new(client: reqwest::Client, credentials: &PlatformCredentials, bucket: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/storage/v1", credentials.url),
            service_role_key: credentials.service_role_key.clone(),
            bucket: bucket.to_string(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn check(response: Response) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let (_, message) = upstream_message(&body);
        tracing::warn!("Storage platform answered {}: {}", status, message);
        Err(StorageError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Deserialize)]
struct BucketInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[async_trait]
impl ObjectStorage for PlatformStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, encode_path(path));
        let response = self
            .authorized(self.client.post(url))
            .header("x-upsert", "true")
            .header("cache-control", format!("max-age={CACHE_CONTROL_SECS}"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(path),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    async fn ensure_bucket(&self) -> Result<bool, StorageError> {
        let response = self
            .authorized(self.client.get(format!("{}/bucket", self.base_url)))
            .send()
            .await?;
        let buckets: Vec<BucketInfo> = Self::check(response).await?.json().await?;
        let exists = buckets.iter().any(|b| {
            b.name.as_deref() == Some(self.bucket.as_str())
                || b.id.as_deref() == Some(self.bucket.as_str())
        });
        if exists {
            return Ok(false);
        }

        let response = self
            .authorized(self.client.post(format!("{}/bucket", self.base_url)))
            .json(&serde_json::json!({
                "id": self.bucket,
                "name": self.bucket,
                "public": true,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!("Created public storage bucket '{}'", self.bucket);
        Ok(true)
    }
}

/// Filesystem-backed storage served at `/uploads`
pub struct LocalStorage {
    root: PathBuf,
    bucket: String,
}

impl LocalStorage {
    pub fn new(root: &Path, bucket: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            bucket: bucket.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &bytes).await?;
        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(path),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("/uploads/{}", encode_path(path))
    }

    async fn ensure_bucket(&self) -> Result<bool, StorageError> {
        if fs::try_exists(&self.root).await? {
            return Ok(false);
        }
        fs::create_dir_all(&self.root).await?;
        Ok(true)
    }
}
