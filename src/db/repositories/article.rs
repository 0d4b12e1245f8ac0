//! Article repository
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and PostgreSQL
//!
//! Reads join the author's name for display. Writes store whole rows; the
//! workflow rules (slug, `published_at`) are applied by the service before a
//! row reaches this layer.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleStatus, AuthorRef};

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Published articles, newest publication first, optionally in one category
    async fn list_published(&self, category: Option<&str>, limit: i64) -> Result<Vec<Article>>;

    /// All articles regardless of status, newest first by creation time
    async fn list_recent(&self, limit: i64) -> Result<Vec<Article>>;

    /// Most recently published article
    async fn latest_published(&self) -> Result<Option<Article>>;

    /// Get article by ID (any status)
    async fn get_by_id(&self, id: &str) -> Result<Option<Article>>;

    /// Get article by slug (any status)
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// Exact count of articles in one status
    async fn count_by_status(&self, status: ArticleStatus) -> Result<i64>;

    /// Insert the article, or overwrite the row with the same id.
    /// `created_at` of an existing row is preserved.
    async fn upsert(&self, article: &Article) -> Result<()>;

    /// Set status and publication time; returns false when no row matched
    async fn update_status(
        &self,
        id: &str,
        status: ArticleStatus,
        published_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_ARTICLE: &str = "SELECT a.id, a.title, a.slug, a.excerpt, a.body, a.category, \
     a.author_id, a.featured_image_url, a.status, a.published_at, a.created_at, a.updated_at, \
     j.name AS journalist_name \
     FROM articles a LEFT JOIN journalists j ON j.id = a.author_id";

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: String,
    title: String,
    slug: Option<String>,
    excerpt: Option<String>,
    body: Option<String>,
    category: String,
    author_id: Option<String>,
    featured_image_url: Option<String>,
    status: String,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    journalist_name: Option<String>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|_| {
            tracing::warn!("Article {} has unknown status '{}', treating as draft", row.id, row.status);
            ArticleStatus::Draft
        });
        Article {
            id: row.id,
            title: row.title,
            slug: row.slug,
            excerpt: row.excerpt,
            body: row.body,
            category: row.category,
            author_id: row.author_id,
            featured_image_url: row.featured_image_url,
            status,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            journalist: row.journalist_name.map(|name| AuthorRef { name }),
        }
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn list_published(&self, category: Option<&str>, limit: i64) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = match category {
            Some(category) => {
                let sql = format!(
                    "{SELECT_ARTICLE} WHERE a.status = $1 AND a.category = $2 \
                     ORDER BY a.published_at DESC LIMIT $3"
                );
                with_pool!(self.pool, |db| {
                    sqlx::query_as::<_, ArticleRow>(&sql)
                        .bind(ArticleStatus::Published.as_str())
                        .bind(category)
                        .bind(limit)
                        .fetch_all(db)
                        .await?
                })
            }
            None => {
                let sql = format!(
                    "{SELECT_ARTICLE} WHERE a.status = $1 ORDER BY a.published_at DESC LIMIT $2"
                );
                with_pool!(self.pool, |db| {
                    sqlx::query_as::<_, ArticleRow>(&sql)
                        .bind(ArticleStatus::Published.as_str())
                        .bind(limit)
                        .fetch_all(db)
                        .await?
                })
            }
        };
        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Article>> {
        let sql = format!("{SELECT_ARTICLE} ORDER BY a.created_at DESC LIMIT $1");
        let rows = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, ArticleRow>(&sql)
                .bind(limit)
                .fetch_all(db)
                .await?
        });
        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn latest_published(&self) -> Result<Option<Article>> {
        Ok(self.list_published(None, 1).await?.into_iter().next())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Article>> {
        let sql = format!("{SELECT_ARTICLE} WHERE a.id = $1");
        let row = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, ArticleRow>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await?
        });
        Ok(row.map(Article::from))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!(
            "{SELECT_ARTICLE} WHERE a.slug = $1 ORDER BY a.published_at DESC LIMIT 1"
        );
        let row = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, ArticleRow>(&sql)
                .bind(slug)
                .fetch_optional(db)
                .await?
        });
        Ok(row.map(Article::from))
    }

    async fn count_by_status(&self, status: ArticleStatus) -> Result<i64> {
        let count = with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(db)
                .await?
        });
        Ok(count)
    }

    async fn upsert(&self, article: &Article) -> Result<()> {
        const SQL: &str = "INSERT INTO articles \
             (id, title, slug, excerpt, body, category, author_id, featured_image_url, \
              status, published_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO UPDATE SET \
              title = excluded.title, slug = excluded.slug, excerpt = excluded.excerpt, \
              body = excluded.body, category = excluded.category, \
              author_id = excluded.author_id, featured_image_url = excluded.featured_image_url, \
              status = excluded.status, published_at = excluded.published_at, \
              updated_at = excluded.updated_at";
        with_pool!(self.pool, |db| {
            sqlx::query(SQL)
                .bind(&article.id)
                .bind(&article.title)
                .bind(&article.slug)
                .bind(&article.excerpt)
                .bind(&article.body)
                .bind(&article.category)
                .bind(&article.author_id)
                .bind(&article.featured_image_url)
                .bind(article.status.as_str())
                .bind(article.published_at)
                .bind(article.created_at)
                .bind(article.updated_at)
                .execute(db)
                .await
                .map(|_| ())?
        });
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: ArticleStatus,
        published_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        const SQL: &str =
            "UPDATE articles SET status = $1, published_at = $2, updated_at = $3 WHERE id = $4";
        let result = with_pool!(self.pool, |db| {
            sqlx::query(SQL)
                .bind(status.as_str())
                .bind(published_at)
                .bind(updated_at)
                .bind(id)
                .execute(db)
                .await?
                .rows_affected()
        });
        Ok(result > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations, now_utc};
    use crate::db::repositories::{JournalistRepository, SqlxJournalistRepository};
    use crate::models::{Journalist, JournalistRole, JournalistStatus};
    use chrono::Duration;

    async fn setup() -> (SqlxArticleRepository, SqlxJournalistRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        (
            SqlxArticleRepository::new(pool.clone()),
            SqlxJournalistRepository::new(pool),
        )
    }

    fn article(id: &str, category: &str, status: ArticleStatus, published_at: Option<DateTime<Utc>>) -> Article {
        let now = now_utc();
        Article {
            id: id.to_string(),
            title: format!("Story {id}"),
            slug: Some(format!("story-{id}")),
            excerpt: None,
            body: Some("<p>Body</p>".to_string()),
            category: category.to_string(),
            author_id: None,
            featured_image_url: None,
            status,
            published_at,
            created_at: now,
            updated_at: now,
            journalist: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_with_author_join() {
        let (repo, journalists) = setup().await;
        let now = now_utc();
        journalists
            .insert(&Journalist {
                id: "j1".into(),
                name: "Ada Obi".into(),
                email: Some("ada@school.edu".into()),
                role: JournalistRole::Editor,
                department: None,
                bio: None,
                avatar_url: None,
                status: JournalistStatus::Active,
                auth_user_id: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let mut a = article("a1", "Politics", ArticleStatus::Draft, None);
        a.author_id = Some("j1".into());
        repo.upsert(&a).await.unwrap();

        let loaded = repo.get_by_id("a1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Story a1");
        assert_eq!(loaded.journalist, Some(AuthorRef { name: "Ada Obi".into() }));
        assert_eq!(loaded.created_at, a.created_at);

        let created = a.created_at;
        a.title = "Revised".into();
        a.created_at = now + Duration::days(1);
        repo.upsert(&a).await.unwrap();
        let loaded = repo.get_by_id("a1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Revised");
        assert_eq!(loaded.created_at, created, "created_at survives overwrite");

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_published_orders_and_filters() {
        let (repo, _) = setup().await;
        let now = now_utc();
        repo.upsert(&article("old", "Sports", ArticleStatus::Published, Some(now - Duration::days(2)))).await.unwrap();
        repo.upsert(&article("new", "Politics", ArticleStatus::Published, Some(now))).await.unwrap();
        repo.upsert(&article("draft", "Sports", ArticleStatus::Draft, None)).await.unwrap();

        let all = repo.list_published(None, 20).await.unwrap();
        let ids: Vec<_> = all.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let sports = repo.list_published(Some("Sports"), 20).await.unwrap();
        assert_eq!(sports.len(), 1);
        assert_eq!(sports[0].id, "old");

        assert_eq!(repo.latest_published().await.unwrap().unwrap().id, "new");
        assert_eq!(repo.list_published(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counts_and_status_update() {
        let (repo, _) = setup().await;
        repo.upsert(&article("a", "Sports", ArticleStatus::Draft, None)).await.unwrap();
        repo.upsert(&article("b", "Sports", ArticleStatus::Pending, None)).await.unwrap();
        repo.upsert(&article("c", "Sports", ArticleStatus::Pending, None)).await.unwrap();

        assert_eq!(repo.count_by_status(ArticleStatus::Draft).await.unwrap(), 1);
        assert_eq!(repo.count_by_status(ArticleStatus::Pending).await.unwrap(), 2);
        assert_eq!(repo.count_by_status(ArticleStatus::Published).await.unwrap(), 0);

        let now = now_utc();
        assert!(repo.update_status("b", ArticleStatus::Published, Some(now), now).await.unwrap());
        assert!(!repo.update_status("zzz", ArticleStatus::Draft, None, now).await.unwrap());

        let b = repo.get_by_id("b").await.unwrap().unwrap();
        assert_eq!(b.status, ArticleStatus::Published);
        assert_eq!(b.published_at, Some(now));
    }

    #[tokio::test]
    async fn test_get_by_slug_and_recent() {
        let (repo, _) = setup().await;
        let mut first = article("1", "Opinion", ArticleStatus::Draft, None);
        first.created_at = now_utc() - Duration::hours(1);
        repo.upsert(&first).await.unwrap();
        repo.upsert(&article("2", "Opinion", ArticleStatus::Draft, None)).await.unwrap();

        assert_eq!(repo.get_by_slug("story-1").await.unwrap().unwrap().id, "1");
        assert!(repo.get_by_slug("nope").await.unwrap().is_none());

        let recent = repo.list_recent(50).await.unwrap();
        assert_eq!(recent[0].id, "2");
    }
}
