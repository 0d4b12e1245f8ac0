//! Media service
//!
//! Uploads go to object storage first; the media library row is written only
//! after the object is stored. Featured images are stored without a library
//! row, matching how the article editor uses them.

use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;

use crate::config::UploadConfig;
use crate::db::repositories::MediaRepository;
use crate::models::{MediaItem, NewMediaItem};
use crate::platform::{storage_object_path, ObjectStorage, StoredObject};

/// Folder for media library uploads
pub const MEDIA_FOLDER: &str = "media";
/// Folder for article featured images
pub const ARTICLE_IMAGE_FOLDER: &str = "articles";
/// Default media library page size
pub const MEDIA_LIST_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum MediaServiceError {
    #[error("{0}")]
    ValidationError(String),

    /// Storage refused the object; the message is the storage service's own
    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct MediaService {
    repo: Arc<dyn MediaRepository>,
    storage: Arc<dyn ObjectStorage>,
    config: UploadConfig,
}

impl MediaService {
    pub fn new(
        repo: Arc<dyn MediaRepository>,
        storage: Arc<dyn ObjectStorage>,
        config: UploadConfig,
    ) -> Self {
        Self {
            repo,
            storage,
            config,
        }
    }

    /// Newest uploads first
    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<MediaItem>, MediaServiceError> {
        let limit = limit.unwrap_or(MEDIA_LIST_LIMIT).clamp(1, 500);
        Ok(self
            .repo
            .list(limit)
            .await
            .context("Failed to list media")?)
    }

    /// Store a file in the media library
    pub async fn upload_media(
        &self,
        file: UploadedFile,
        uploaded_by: Option<String>,
    ) -> Result<MediaItem, MediaServiceError> {
        if !self.config.is_type_allowed(&file.content_type) {
            return Err(MediaServiceError::ValidationError(format!(
                "Invalid file type: {}. Allowed types: {}",
                file.content_type,
                self.config.allowed_types.join(", ")
            )));
        }
        self.check_size(&file)?;

        let size = file.bytes.len() as i64;
        let name = file.file_name.clone();
        let content_type = file.content_type.clone();
        let stored = self.store(MEDIA_FOLDER, file).await?;

        let item = self
            .repo
            .insert(&NewMediaItem {
                name,
                mime_type: content_type,
                size_bytes: Some(size),
                storage_path: stored.path,
                bucket_name: self.storage.bucket().to_string(),
                public_url: Some(stored.public_url),
                uploaded_by,
            })
            .await
            .context("Failed to record media upload")?;
        tracing::info!("Media {} uploaded ({} bytes)", item.storage_path, size);
        Ok(item)
    }

    /// Store an article featured image. Only `image/*` types are accepted.
    pub async fn upload_article_image(
        &self,
        file: UploadedFile,
    ) -> Result<StoredObject, MediaServiceError> {
        if !file.content_type.starts_with("image/") {
            return Err(MediaServiceError::ValidationError(
                "Only image files can be used as a featured image".to_string(),
            ));
        }
        self.check_size(&file)?;
        let stored = self.store(ARTICLE_IMAGE_FOLDER, file).await?;
        tracing::info!("Featured image uploaded to {}", stored.path);
        Ok(stored)
    }

    fn check_size(&self, file: &UploadedFile) -> Result<(), MediaServiceError> {
        if file.bytes.is_empty() {
            return Err(MediaServiceError::ValidationError("File is empty".to_string()));
        }
        if file.bytes.len() as u64 > self.config.max_file_size {
            return Err(MediaServiceError::ValidationError(format!(
                "File too large. Maximum size: {} bytes ({} MB)",
                self.config.max_file_size,
                self.config.max_file_size / 1024 / 1024
            )));
        }
        Ok(())
    }

    async fn store(
        &self,
        folder: &str,
        file: UploadedFile,
    ) -> Result<StoredObject, MediaServiceError> {
        let path = storage_object_path(folder, &file.file_name, chrono::Utc::now().timestamp_millis());
        self.storage
            .upload(&path, file.bytes, &file.content_type)
            .await
            .map_err(|e| MediaServiceError::Upstream(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxMediaRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::platform::LocalStorage;

    async fn setup(dir: &std::path::Path) -> MediaService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        MediaService::new(
            SqlxMediaRepository::boxed(pool),
            Arc::new(LocalStorage::new(dir, "acj-media")),
            UploadConfig::default(),
        )
    }

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: "image/png".into(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[tokio::test]
    async fn test_upload_media_records_row() {
        let dir = tempfile::tempdir().unwrap();
        let service = setup(dir.path()).await;

        let item = service.upload_media(png("Team photo.png"), None).await.unwrap();
        assert!(item.storage_path.starts_with("media/"));
        assert!(item.storage_path.ends_with("-Team-photo.png"));
        assert_eq!(item.bucket_name, "acj-media");
        assert_eq!(item.size_bytes, Some(4));
        assert!(dir.path().join(&item.storage_path).exists());

        assert_eq!(service.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_media_rejects_type_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let service = setup(dir.path()).await;

        let exe = UploadedFile {
            file_name: "tool.exe".into(),
            content_type: "application/x-msdownload".into(),
            bytes: vec![1],
        };
        assert!(matches!(
            service.upload_media(exe, None).await,
            Err(MediaServiceError::ValidationError(_))
        ));

        let mut big = png("big.png");
        big.bytes = vec![0; (UploadConfig::default().max_file_size + 1) as usize];
        assert!(matches!(
            service.upload_media(big, None).await,
            Err(MediaServiceError::ValidationError(_))
        ));
        assert!(service.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_article_image_is_image_only() {
        let dir = tempfile::tempdir().unwrap();
        let service = setup(dir.path()).await;

        let stored = service.upload_article_image(png("cover.png")).await.unwrap();
        assert!(stored.path.starts_with("articles/"));
        assert!(stored.public_url.starts_with("/uploads/articles/"));

        let pdf = UploadedFile {
            file_name: "doc.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: vec![1],
        };
        assert!(matches!(
            service.upload_article_image(pdf).await,
            Err(MediaServiceError::ValidationError(_))
        ));
        assert!(service.list(None).await.unwrap().is_empty(), "no library row for covers");
    }
}
