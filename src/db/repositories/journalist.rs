//! Journalist repository
//!
//! Email lookups are case-insensitive and backed by a unique index on
//! `LOWER(email)`, so an email identifies at most one journalist.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::{Journalist, JournalistRole, JournalistStatus};

/// Journalist repository trait
#[async_trait]
pub trait JournalistRepository: Send + Sync {
    /// Full roster, newest first
    async fn list_all(&self) -> Result<Vec<Journalist>>;

    /// Journalists with status Active, ordered by name
    async fn list_active(&self) -> Result<Vec<Journalist>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Journalist>>;

    async fn find_by_auth_user_id(&self, auth_user_id: &str) -> Result<Option<Journalist>>;

    /// Case-insensitive email match
    async fn find_by_email(&self, email: &str) -> Result<Option<Journalist>>;

    /// Insert a new row; fails on a duplicate id or email
    async fn insert(&self, journalist: &Journalist) -> Result<()>;

    /// Insert, or overwrite the row with the same id (keeping `created_at`)
    async fn upsert_by_id(&self, journalist: &Journalist) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based journalist repository
pub struct SqlxJournalistRepository {
    pool: DynDatabasePool,
}

impl SqlxJournalistRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn JournalistRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_JOURNALIST: &str = "SELECT id, name, email, role, department, bio, avatar_url, \
     status, auth_user_id, created_at, updated_at FROM journalists";

#[derive(sqlx::FromRow)]
struct JournalistRow {
    id: String,
    name: String,
    email: Option<String>,
    role: String,
    department: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    status: String,
    auth_user_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JournalistRow> for Journalist {
    fn from(row: JournalistRow) -> Self {
        // Rows written outside this service may spell roles loosely; only an
        // exact spelling grants privileges.
        let role = JournalistRole::from_stored(&row.role);
        let status = row.status.parse().unwrap_or(JournalistStatus::Inactive);
        Journalist {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            department: row.department,
            bio: row.bio,
            avatar_url: row.avatar_url,
            status,
            auth_user_id: row.auth_user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl JournalistRepository for SqlxJournalistRepository {
    async fn list_all(&self) -> Result<Vec<Journalist>> {
        let sql = format!("{SELECT_JOURNALIST} ORDER BY created_at DESC");
        let rows = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, JournalistRow>(&sql).fetch_all(db).await?
        });
        Ok(rows.into_iter().map(Journalist::from).collect())
    }

    async fn list_active(&self) -> Result<Vec<Journalist>> {
        let sql = format!("{SELECT_JOURNALIST} WHERE status = $1 ORDER BY name");
        let rows = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, JournalistRow>(&sql)
                .bind(JournalistStatus::Active.as_str())
                .fetch_all(db)
                .await?
        });
        Ok(rows.into_iter().map(Journalist::from).collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Journalist>> {
        let sql = format!("{SELECT_JOURNALIST} WHERE id = $1");
        let row = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, JournalistRow>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await?
        });
        Ok(row.map(Journalist::from))
    }

    async fn find_by_auth_user_id(&self, auth_user_id: &str) -> Result<Option<Journalist>> {
        let sql = format!("{SELECT_JOURNALIST} WHERE auth_user_id = $1 LIMIT 1");
        let row = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, JournalistRow>(&sql)
                .bind(auth_user_id)
                .fetch_optional(db)
                .await?
        });
        Ok(row.map(Journalist::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Journalist>> {
        let sql = format!("{SELECT_JOURNALIST} WHERE LOWER(email) = LOWER($1) LIMIT 1");
        let row = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, JournalistRow>(&sql)
                .bind(email.trim())
                .fetch_optional(db)
                .await?
        });
        Ok(row.map(Journalist::from))
    }

    async fn insert(&self, j: &Journalist) -> Result<()> {
        const SQL: &str = "INSERT INTO journalists \
             (id, name, email, role, department, bio, avatar_url, status, auth_user_id, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";
        with_pool!(self.pool, |db| {
            sqlx::query(SQL)
                .bind(&j.id)
                .bind(&j.name)
                .bind(&j.email)
                .bind(j.role.as_str())
                .bind(&j.department)
                .bind(&j.bio)
                .bind(&j.avatar_url)
                .bind(j.status.as_str())
                .bind(&j.auth_user_id)
                .bind(j.created_at)
                .bind(j.updated_at)
                .execute(db)
                .await
                .map(|_| ())?
        });
        Ok(())
    }

    async fn upsert_by_id(&self, j: &Journalist) -> Result<()> {
        const SQL: &str = "INSERT INTO journalists \
             (id, name, email, role, department, bio, avatar_url, status, auth_user_id, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (id) DO UPDATE SET \
              name = excluded.name, email = excluded.email, role = excluded.role, \
              department = excluded.department, bio = excluded.bio, \
              avatar_url = excluded.avatar_url, status = excluded.status, \
              auth_user_id = excluded.auth_user_id, updated_at = excluded.updated_at";
        with_pool!(self.pool, |db| {
            sqlx::query(SQL)
                .bind(&j.id)
                .bind(&j.name)
                .bind(&j.email)
                .bind(j.role.as_str())
                .bind(&j.department)
                .bind(&j.bio)
                .bind(&j.avatar_url)
                .bind(j.status.as_str())
                .bind(&j.auth_user_id)
                .bind(j.created_at)
                .bind(j.updated_at)
                .execute(db)
                .await
                .map(|_| ())?
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM journalists")
                .fetch_one(db)
                .await?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations, now_utc};
    use crate::db::repositories::is_unique_violation;

    async fn setup() -> (SqlxJournalistRepository, DynDatabasePool) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        (SqlxJournalistRepository::new(pool.clone()), pool)
    }

    fn journalist(id: &str, name: &str, email: Option<&str>) -> Journalist {
        let now = now_utc();
        Journalist {
            id: id.into(),
            name: name.into(),
            email: email.map(Into::into),
            role: JournalistRole::Contributor,
            department: None,
            bio: None,
            avatar_url: None,
            status: JournalistStatus::Active,
            auth_user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let (repo, _) = setup().await;
        repo.insert(&journalist("j1", "Ada", Some("Ada@School.edu"))).await.unwrap();

        let found = repo.find_by_email("  ada@school.EDU ").await.unwrap().unwrap();
        assert_eq!(found.id, "j1");
        assert!(repo.find_by_email("bob@school.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let (repo, _) = setup().await;
        repo.insert(&journalist("j1", "Ada", Some("ada@school.edu"))).await.unwrap();

        let err = repo
            .insert(&journalist("j2", "Ada Two", Some("ADA@school.edu")))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_list_active_ordered_by_name() {
        let (repo, _) = setup().await;
        repo.insert(&journalist("1", "Zara", None)).await.unwrap();
        repo.insert(&journalist("2", "Ben", None)).await.unwrap();
        let mut away = journalist("3", "Cleo", None);
        away.status = JournalistStatus::OnLeave;
        repo.insert(&away).await.unwrap();

        let names: Vec<_> = repo.list_active().await.unwrap().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["Ben", "Zara"]);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_by_id_overwrites() {
        let (repo, _) = setup().await;
        let mut j = journalist("j1", "Ada", None);
        repo.upsert_by_id(&j).await.unwrap();

        j.role = JournalistRole::EditorInChief;
        j.auth_user_id = Some("auth-1".into());
        repo.upsert_by_id(&j).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let found = repo.find_by_auth_user_id("auth-1").await.unwrap().unwrap();
        assert!(found.is_editor_in_chief());
    }

    #[tokio::test]
    async fn test_only_exact_role_spelling_in_storage_is_privileged() {
        let (repo, pool) = setup().await;
        sqlx::query(
            "INSERT INTO journalists (id, name, role, status, created_at, updated_at) \
             VALUES ('x', 'Old Row', 'Editor-in-Chief', 'Active', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP), \
                    ('y', 'Odd Row', 'Publisher', 'Active', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP), \
                    ('z', 'Low Row', 'editor in chief', 'Active', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap();

        assert_eq!(repo.get_by_id("x").await.unwrap().unwrap().role, JournalistRole::EditorInChief);
        assert_eq!(repo.get_by_id("y").await.unwrap().unwrap().role, JournalistRole::Contributor);
        assert!(!repo.get_by_id("z").await.unwrap().unwrap().is_editor_in_chief());
    }
}
