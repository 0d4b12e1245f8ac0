//! Article service
//!
//! Implements the editorial workflow on top of the article repository:
//! - Public reads (published articles only)
//! - Editor saves, partial updates and status changes
//! - Slug derivation and the `published_at` rule
//! - Optional publish gating and stale-write detection

use crate::db::now_utc;
use crate::db::repositories::ArticleRepository;
use crate::models::{
    is_known_category, published_at_on_save, published_at_on_transition, Article, ArticleCounts,
    ArticlePatch, ArticleStatus, SaveArticleInput,
};
use anyhow::Context;
use std::sync::Arc;

/// Default page size for the public list
pub const PUBLIC_LIST_LIMIT: i64 = 20;
/// Default page size for the admin list
pub const ADMIN_LIST_LIMIT: i64 = 50;
/// Upper bound accepted for any list limit
pub const MAX_LIST_LIMIT: i64 = 200;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    /// Caller may not make this change
    #[error("{0}")]
    Forbidden(String),

    /// The stored article changed since the caller read it
    #[error("Article was modified by someone else (stored updated_at {0})")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Turn a title into a URL slug: lowercase, quotes dropped, every run of
/// characters outside `[a-z0-9]` collapsed to one `-`, no edge hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.trim().to_lowercase().chars() {
        if c == '\'' || c == '"' {
            continue;
        }
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Article service
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    restrict_publishing: bool,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>) -> Self {
        Self {
            repo,
            restrict_publishing: false,
        }
    }

    /// Only callers allowed to publish may move an article into `published`
    pub fn with_publish_restriction(mut self, restrict: bool) -> Self {
        self.restrict_publishing = restrict;
        self
    }

    // ========================================================================
    // Public reads
    // ========================================================================

    /// Published articles, newest first, optionally in one category
    pub async fn list_published(
        &self,
        category: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Article>, ArticleServiceError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let articles = self
            .repo
            .list_published(category, clamp_limit(limit, PUBLIC_LIST_LIMIT))
            .await
            .context("Failed to list published articles")?;
        Ok(articles)
    }

    /// A published article by id, falling back to slug
    pub async fn get_published(
        &self,
        id_or_slug: &str,
    ) -> Result<Option<Article>, ArticleServiceError> {
        let by_id = self
            .repo
            .get_by_id(id_or_slug)
            .await
            .context("Failed to get article by ID")?;
        let article = match by_id {
            Some(article) => Some(article),
            None => self
                .repo
                .get_by_slug(id_or_slug)
                .await
                .context("Failed to get article by slug")?,
        };
        Ok(article.filter(Article::is_published))
    }

    pub async fn get_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Article>, ArticleServiceError> {
        let article = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article by slug")?;
        Ok(article.filter(Article::is_published))
    }

    /// Up to `limit` other recent published articles
    pub async fn related(
        &self,
        article: &Article,
        limit: usize,
    ) -> Result<Vec<Article>, ArticleServiceError> {
        let candidates = self
            .repo
            .list_published(None, limit as i64 + 1)
            .await
            .context("Failed to list related articles")?;
        Ok(candidates
            .into_iter()
            .filter(|a| a.id != article.id)
            .take(limit)
            .collect())
    }

    // ========================================================================
    // Admin reads
    // ========================================================================

    /// All statuses, newest created first
    pub async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<Article>, ArticleServiceError> {
        let articles = self
            .repo
            .list_recent(clamp_limit(limit, ADMIN_LIST_LIMIT))
            .await
            .context("Failed to list articles")?;
        Ok(articles)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Article>, ArticleServiceError> {
        let article = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article by ID")?;
        Ok(article)
    }

    pub async fn latest_published(&self) -> Result<Option<Article>, ArticleServiceError> {
        let article = self
            .repo
            .latest_published()
            .await
            .context("Failed to get latest published article")?;
        Ok(article)
    }

    /// Exact per-status counts, queried concurrently
    pub async fn counts(&self) -> Result<ArticleCounts, ArticleServiceError> {
        let (draft, pending, published) = futures::try_join!(
            self.repo.count_by_status(ArticleStatus::Draft),
            self.repo.count_by_status(ArticleStatus::Pending),
            self.repo.count_by_status(ArticleStatus::Published),
        )
        .context("Failed to count articles")?;
        Ok(ArticleCounts {
            draft,
            pending,
            published,
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Editor save: create a new article, or overwrite the one named by `id`
    pub async fn save(
        &self,
        input: SaveArticleInput,
        can_publish: bool,
    ) -> Result<Article, ArticleServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ArticleServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        Self::validate_category(&input.category)?;

        let existing = match non_blank(input.id.clone()) {
            Some(id) => self
                .repo
                .get_by_id(&id)
                .await
                .context("Failed to load article for save")?,
            None => None,
        };
        let was_published = existing.as_ref().is_some_and(Article::is_published);
        self.check_publish(input.status, was_published, can_publish)?;

        let now = now_utc();
        let slug = non_blank(input.slug).unwrap_or_else(|| slugify(&title));
        let published_at = published_at_on_save(
            input.status,
            input.published_at,
            existing.as_ref().and_then(|a| a.published_at),
            now,
        );

        let article = Article {
            id: non_blank(input.id).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title,
            slug: Some(slug).filter(|s| !s.is_empty()),
            excerpt: input.excerpt,
            body: input.body,
            category: input.category.trim().to_string(),
            author_id: non_blank(input.author_id),
            featured_image_url: non_blank(input.featured_image_url),
            status: input.status,
            published_at,
            created_at: existing.as_ref().map(|a| a.created_at).unwrap_or(now),
            updated_at: now,
            journalist: None,
        };

        self.repo
            .upsert(&article)
            .await
            .context("Failed to save article")?;
        if article.is_published() && !was_published {
            tracing::info!("Article {} published", article.id);
        }
        self.reload(&article.id).await
    }

    /// Partial update. Only supplied fields change; a new title regenerates
    /// the slug unless one is supplied with it.
    pub async fn update(
        &self,
        id: &str,
        patch: ArticlePatch,
        can_publish: bool,
    ) -> Result<Article, ArticleServiceError> {
        let mut article = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load article for update")?
            .ok_or_else(|| ArticleServiceError::NotFound(id.to_string()))?;

        if let Some(expected) = patch.expected_updated_at {
            if expected != article.updated_at {
                return Err(ArticleServiceError::Conflict(article.updated_at.to_rfc3339()));
            }
        }
        if patch.is_empty() {
            return Ok(article);
        }

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ArticleServiceError::ValidationError(
                    "Title cannot be empty".to_string(),
                ));
            }
            article.slug = Some(slugify(&title)).filter(|s| !s.is_empty());
            article.title = title;
        }
        if let Some(slug) = patch.slug {
            article.slug = non_blank(slug);
        }
        if let Some(excerpt) = patch.excerpt {
            article.excerpt = excerpt;
        }
        if let Some(body) = patch.body {
            article.body = body;
        }
        if let Some(category) = patch.category {
            Self::validate_category(&category)?;
            article.category = category.trim().to_string();
        }
        if let Some(author_id) = patch.author_id {
            article.author_id = non_blank(author_id);
        }
        if let Some(url) = patch.featured_image_url {
            article.featured_image_url = non_blank(url);
        }

        let now = now_utc();
        if let Some(status) = patch.status {
            self.check_publish(status, article.is_published(), can_publish)?;
            article.status = status;
            article.published_at = published_at_on_transition(status, now);
            if status == ArticleStatus::Published {
                tracing::info!("Article {} published", article.id);
            }
        }
        article.updated_at = now;

        self.repo
            .upsert(&article)
            .await
            .context("Failed to update article")?;
        self.reload(id).await
    }

    /// Move an article to `status`. Publishing stamps `published_at` with the
    /// current time; any other status clears it.
    pub async fn set_status(
        &self,
        id: &str,
        status: ArticleStatus,
        can_publish: bool,
    ) -> Result<Article, ArticleServiceError> {
        let current = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load article for status change")?
            .ok_or_else(|| ArticleServiceError::NotFound(id.to_string()))?;
        self.check_publish(status, current.is_published(), can_publish)?;

        let now = now_utc();
        let updated = self
            .repo
            .update_status(id, status, published_at_on_transition(status, now), now)
            .await
            .context("Failed to update article status")?;
        if !updated {
            return Err(ArticleServiceError::NotFound(id.to_string()));
        }
        tracing::info!("Article {} moved from {} to {}", id, current.status, status);
        self.reload(id).await
    }

    async fn reload(&self, id: &str) -> Result<Article, ArticleServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to reload article")?
            .ok_or_else(|| ArticleServiceError::NotFound(id.to_string()))
    }

    fn validate_category(category: &str) -> Result<(), ArticleServiceError> {
        if is_known_category(category.trim()) {
            Ok(())
        } else {
            Err(ArticleServiceError::ValidationError(format!(
                "Unknown category: {}",
                category
            )))
        }
    }

    fn check_publish(
        &self,
        status: ArticleStatus,
        already_published: bool,
        can_publish: bool,
    ) -> Result<(), ArticleServiceError> {
        if self.restrict_publishing
            && status == ArticleStatus::Published
            && !already_published
            && !can_publish
        {
            return Err(ArticleServiceError::Forbidden(
                "Only Editor in Chief can publish articles".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxArticleRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    async fn setup_test_service() -> ArticleService {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        ArticleService::new(SqlxArticleRepository::boxed(pool))
    }

    fn draft(title: &str) -> SaveArticleInput {
        SaveArticleInput {
            title: title.to_string(),
            category: "Campus News".to_string(),
            body: Some("<p>Text</p>".to_string()),
            ..Default::default()
        }
    }

    // ========================================================================
    // Slug tests
    // ========================================================================

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn test_slugify_drops_quotes_and_punctuation() {
        assert_eq!(slugify("  Dean's \"Open\" Day: 2025!  "), "deans-open-day-2025");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn slugify_output_is_url_safe(title in ".{0,80}") {
            let slug = slugify(&title);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert_eq!(slugify(&slug), slug.clone());
        }
    }

    // ========================================================================
    // Workflow tests
    // ========================================================================

    #[tokio::test]
    async fn test_save_creates_draft_with_slug() {
        let service = setup_test_service().await;
        let article = service.save(draft("Budget Vote Tonight"), false).await.unwrap();

        assert_eq!(article.slug.as_deref(), Some("budget-vote-tonight"));
        assert_eq!(article.status, ArticleStatus::Draft);
        assert!(article.published_at.is_none());
        assert!(uuid::Uuid::parse_str(&article.id).is_ok());
    }

    #[tokio::test]
    async fn test_save_validates_title_and_category() {
        let service = setup_test_service().await;
        let mut input = draft("   ");
        assert!(matches!(
            service.save(input.clone(), true).await,
            Err(ArticleServiceError::ValidationError(_))
        ));
        input.title = "Fine".into();
        input.category = "Weather".into();
        assert!(matches!(
            service.save(input, true).await,
            Err(ArticleServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_save_published_keeps_supplied_time() {
        let service = setup_test_service().await;
        let earlier = now_utc() - Duration::days(2);
        let mut input = draft("Back Dated");
        input.status = ArticleStatus::Published;
        input.published_at = Some(earlier);

        let article = service.save(input, true).await.unwrap();
        assert_eq!(article.published_at, Some(earlier));

        let mut resave = draft("Back Dated");
        resave.id = Some(article.id.clone());
        resave.status = ArticleStatus::Published;
        let again = service.save(resave, true).await.unwrap();
        assert_eq!(again.published_at, Some(earlier), "existing time survives a re-save");
        assert_eq!(again.created_at, article.created_at);
    }

    #[tokio::test]
    async fn test_set_status_stamps_and_clears_published_at() {
        let service = setup_test_service().await;
        let article = service.save(draft("Status Story"), true).await.unwrap();

        let before = Utc::now() - Duration::seconds(1);
        let published = service
            .set_status(&article.id, ArticleStatus::Published, true)
            .await
            .unwrap();
        assert_eq!(published.status, ArticleStatus::Published);
        assert!(published.published_at.unwrap() >= before);

        let pending = service
            .set_status(&article.id, ArticleStatus::Pending, true)
            .await
            .unwrap();
        assert!(pending.published_at.is_none());

        assert!(matches!(
            service.set_status("missing", ArticleStatus::Draft, true).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_regenerates_slug_and_applies_status_rule() {
        let service = setup_test_service().await;
        let article = service.save(draft("Old Title"), true).await.unwrap();

        let patch: ArticlePatch =
            serde_json::from_value(serde_json::json!({"title": "New Title", "status": "published"}))
                .unwrap();
        let updated = service.update(&article.id, patch, true).await.unwrap();
        assert_eq!(updated.slug.as_deref(), Some("new-title"));
        assert!(updated.published_at.is_some());

        let patch: ArticlePatch =
            serde_json::from_value(serde_json::json!({"title": "Third", "slug": "custom"})).unwrap();
        let updated = service.update(&article.id, patch, true).await.unwrap();
        assert_eq!(updated.slug.as_deref(), Some("custom"));

        let patch: ArticlePatch =
            serde_json::from_value(serde_json::json!({"excerpt": null, "status": "draft"})).unwrap();
        let updated = service.update(&article.id, patch, true).await.unwrap();
        assert!(updated.excerpt.is_none());
        assert!(updated.published_at.is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_stale_write() {
        let service = setup_test_service().await;
        let article = service.save(draft("Contested"), true).await.unwrap();

        let patch = ArticlePatch {
            title: Some("Mine".into()),
            expected_updated_at: Some(article.updated_at - Duration::seconds(5)),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&article.id, patch, true).await,
            Err(ArticleServiceError::Conflict(_))
        ));

        let patch = ArticlePatch {
            title: Some("Mine".into()),
            expected_updated_at: Some(article.updated_at),
            ..Default::default()
        };
        assert_eq!(service.update(&article.id, patch, true).await.unwrap().title, "Mine");
    }

    #[tokio::test]
    async fn test_publish_restriction() {
        let service = setup_test_service().await.with_publish_restriction(true);
        let article = service.save(draft("Gated"), false).await.unwrap();

        assert!(matches!(
            service.set_status(&article.id, ArticleStatus::Published, false).await,
            Err(ArticleServiceError::Forbidden(_))
        ));
        service
            .set_status(&article.id, ArticleStatus::Published, true)
            .await
            .unwrap();
        // Editing an already-published piece stays allowed.
        let patch = ArticlePatch {
            excerpt: Some(Some("Short".into())),
            ..Default::default()
        };
        service.update(&article.id, patch, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_public_reads_hide_unpublished() {
        let service = setup_test_service().await;
        let hidden = service.save(draft("Hidden Draft"), true).await.unwrap();
        let mut input = draft("Visible Story");
        input.status = ArticleStatus::Published;
        let visible = service.save(input, true).await.unwrap();

        assert!(service.get_published(&hidden.id).await.unwrap().is_none());
        assert!(service.get_published("hidden-draft").await.unwrap().is_none());
        assert_eq!(
            service.get_published("visible-story").await.unwrap().unwrap().id,
            visible.id
        );
        assert!(service.get_published_by_slug("visible-story").await.unwrap().is_some());

        let counts = service.counts().await.unwrap();
        assert_eq!(counts, ArticleCounts { draft: 1, pending: 0, published: 1 });
        assert!(service.related(&visible, 3).await.unwrap().is_empty());
    }
}
