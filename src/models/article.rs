//! Article model
//!
//! This module provides:
//! - `Article` entity with its display-joined author name
//! - `ArticleStatus` enum for the editorial workflow
//! - The fixed category list and its badge styling
//! - Input types for saving and partially updating articles
//! - The `published_at` rules shared by every write path

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::double_option;

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    /// URL-friendly slug, derived from the title unless supplied
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    /// Opaque HTML body
    pub body: Option<String>,
    pub category: String,
    /// Journalist who wrote the piece
    pub author_id: Option<String>,
    pub featured_image_url: Option<String>,
    pub status: ArticleStatus,
    /// Set exactly when `status` is `published`
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Author display join
    pub journalist: Option<AuthorRef>,
}

/// The author's name, joined for display only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub name: String,
}

impl Article {
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }

    /// The segment used in public links: the slug when present, else the id
    pub fn path_segment(&self) -> &str {
        self.slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Article workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Work in progress, private to the newsroom
    #[default]
    Draft,
    /// Submitted for editorial review
    Pending,
    /// Visible on the public site
    Published,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 3] = [Self::Draft, Self::Pending, Self::Published];

    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Pending => "pending",
            ArticleStatus::Published => "published",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ArticleStatus::Draft),
            "pending" => Ok(ArticleStatus::Pending),
            "published" => Ok(ArticleStatus::Published),
            _ => Err(anyhow::anyhow!("Invalid article status: {}", s)),
        }
    }
}

/// Fixed newsroom categories, in display order
pub const CATEGORIES: &[&str] = &[
    "Campus News",
    "Politics",
    "Sports",
    "Academics",
    "Lifestyle",
    "Interview",
    "Opinion",
];

pub fn is_known_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

/// CSS modifier for a category badge; unknown categories get the neutral one
pub fn category_badge_class(category: &str) -> &'static str {
    match category {
        "Campus News" => "badge--campus",
        "Interview" => "badge--interview",
        "Sports" => "badge--sports",
        "Politics" => "badge--politics",
        "Academics" => "badge--academics",
        "Lifestyle" => "badge--lifestyle",
        _ => "badge--neutral",
    }
}

/// `published_at` after an explicit status transition (status change or
/// partial update carrying a status): publishing stamps `now`, anything
/// else clears it.
pub fn published_at_on_transition(
    status: ArticleStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        ArticleStatus::Published => Some(now),
        ArticleStatus::Draft | ArticleStatus::Pending => None,
    }
}

/// `published_at` on the editor's save path: a published article keeps the
/// supplied (or previously stored) timestamp and only falls back to `now`.
pub fn published_at_on_save(
    status: ArticleStatus,
    supplied: Option<DateTime<Utc>>,
    existing: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        ArticleStatus::Published => Some(supplied.or(existing).unwrap_or(now)),
        ArticleStatus::Draft | ArticleStatus::Pending => None,
    }
}

/// Editor save (create or overwrite by id)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveArticleInput {
    /// Existing article to overwrite; a new id is generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub category: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub featured_image_url: Option<String>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Partial update. Absent fields are left alone; nullable fields accept an
/// explicit `null` to clear them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub slug: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub excerpt: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub body: Option<Option<String>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub author_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub featured_image_url: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ArticleStatus>,
    /// Reject the write if the stored `updated_at` differs
    #[serde(default)]
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl ArticlePatch {
    /// True when the patch carries no field changes
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.slug.is_none()
            && self.excerpt.is_none()
            && self.body.is_none()
            && self.category.is_none()
            && self.author_id.is_none()
            && self.featured_image_url.is_none()
            && self.status.is_none()
    }
}

/// Exact article counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCounts {
    pub draft: i64,
    pub pending: i64,
    pub published: i64,
}

impl ArticleCounts {
    pub fn total(&self) -> i64 {
        self.draft + self.pending + self.published
    }
}
