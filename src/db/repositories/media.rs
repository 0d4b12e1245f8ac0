//! Media repository

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{now_utc, DynDatabasePool};
use crate::models::{MediaItem, NewMediaItem};

#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Newest uploads first
    async fn list(&self, limit: i64) -> Result<Vec<MediaItem>>;

    /// Record an uploaded object
    async fn insert(&self, item: &NewMediaItem) -> Result<MediaItem>;
}

pub struct SqlxMediaRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: String,
    name: String,
    mime_type: String,
    size_bytes: Option<i64>,
    storage_path: String,
    bucket_name: String,
    public_url: Option<String>,
    uploaded_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<MediaRow> for MediaItem {
    fn from(row: MediaRow) -> Self {
        MediaItem {
            id: row.id,
            name: row.name,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            storage_path: row.storage_path,
            bucket_name: row.bucket_name,
            public_url: row.public_url,
            uploaded_by: row.uploaded_by,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl MediaRepository for SqlxMediaRepository {
    async fn list(&self, limit: i64) -> Result<Vec<MediaItem>> {
        const SQL: &str = "SELECT id, name, mime_type, size_bytes, storage_path, bucket_name, \
             public_url, uploaded_by, created_at FROM media ORDER BY created_at DESC LIMIT $1";
        let rows = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, MediaRow>(SQL).bind(limit).fetch_all(db).await?
        });
        Ok(rows.into_iter().map(MediaItem::from).collect())
    }

    async fn insert(&self, item: &NewMediaItem) -> Result<MediaItem> {
        const SQL: &str = "INSERT INTO media \
             (id, name, mime_type, size_bytes, storage_path, bucket_name, public_url, \
              uploaded_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";
        let stored = MediaItem {
            id: uuid::Uuid::new_v4().to_string(),
            name: item.name.clone(),
            mime_type: item.mime_type.clone(),
            size_bytes: item.size_bytes,
            storage_path: item.storage_path.clone(),
            bucket_name: item.bucket_name.clone(),
            public_url: item.public_url.clone(),
            uploaded_by: item.uploaded_by.clone(),
            created_at: now_utc(),
        };
        with_pool!(self.pool, |db| {
            sqlx::query(SQL)
                .bind(&stored.id)
                .bind(&stored.name)
                .bind(&stored.mime_type)
                .bind(stored.size_bytes)
                .bind(&stored.storage_path)
                .bind(&stored.bucket_name)
                .bind(&stored.public_url)
                .bind(&stored.uploaded_by)
                .bind(stored.created_at)
                .execute(db)
                .await
                .map(|_| ())?
        });
        Ok(stored)
    }
}
