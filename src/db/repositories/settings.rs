//! Site settings repository
//!
//! Values are JSON documents stored as text so the same column type works on
//! every driver.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{now_utc, DynDatabasePool};
use crate::models::SiteSetting;

/// Repository trait for settings operations
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Get a single setting by key
    async fn get(&self, key: &str) -> Result<Option<SiteSetting>>;

    /// Insert or replace a setting
    async fn upsert(&self, key: &str, value: &serde_json::Value) -> Result<SiteSetting>;
}

/// SQLx-based settings repository
pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct SettingRow {
    key: String,
    value: String,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<SiteSetting>> {
        const SQL: &str = "SELECT key, value, updated_at FROM site_settings WHERE key = $1";
        let row = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, SettingRow>(SQL)
                .bind(key)
                .fetch_optional(db)
                .await?
        });

        row.map(|r| {
            let value = serde_json::from_str(&r.value)
                .with_context(|| format!("Setting '{}' is not valid JSON", r.key))?;
            Ok(SiteSetting {
                key: r.key,
                value,
                updated_at: r.updated_at,
            })
        })
        .transpose()
    }

    async fn upsert(&self, key: &str, value: &serde_json::Value) -> Result<SiteSetting> {
        const SQL: &str = "INSERT INTO site_settings (key, value, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";
        let updated_at = now_utc();
        let text = serde_json::to_string(value)?;
        with_pool!(self.pool, |db| {
            sqlx::query(SQL)
                .bind(key)
                .bind(&text)
                .bind(updated_at)
                .execute(db)
                .await
                .map(|_| ())?
        });
        Ok(SiteSetting {
            key: key.to_string(),
            value: value.clone(),
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqlxSettingsRepository::new(pool);

        assert!(repo.get("general").await.unwrap().is_none());

        repo.upsert("general", &serde_json::json!({"siteTitle": "One"})).await.unwrap();
        repo.upsert("general", &serde_json::json!({"siteTitle": "Two"})).await.unwrap();

        let stored = repo.get("general").await.unwrap().unwrap();
        assert_eq!(stored.value["siteTitle"], "Two");
    }
}
