//! Media library model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded object recorded in the media library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    /// Original file name
    pub name: String,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size_bytes: Option<i64>,
    /// Object path inside the bucket
    pub storage_path: String,
    pub bucket_name: String,
    pub public_url: Option<String>,
    /// Journalist who uploaded the file
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row to insert after a successful upload
#[derive(Debug, Clone)]
pub struct NewMediaItem {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: Option<i64>,
    pub storage_path: String,
    pub bucket_name: String,
    pub public_url: Option<String>,
    pub uploaded_by: Option<String>,
}
