//! Contact submission repository

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{now_utc, DynDatabasePool};
use crate::models::{Contact, ContactSubmission};

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn insert(&self, submission: &ContactSubmission) -> Result<Contact>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn insert(&self, submission: &ContactSubmission) -> Result<Contact> {
        const SQL: &str = "INSERT INTO contacts \
             (id, full_name, email, subject_type, message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)";
        let contact = Contact {
            id: uuid::Uuid::new_v4().to_string(),
            full_name: submission.full_name.clone(),
            email: submission.email.clone(),
            subject_type: submission.subject_type.clone(),
            message: submission.message.clone(),
            created_at: now_utc(),
        };
        with_pool!(self.pool, |db| {
            sqlx::query(SQL)
                .bind(&contact.id)
                .bind(&contact.full_name)
                .bind(&contact.email)
                .bind(&contact.subject_type)
                .bind(&contact.message)
                .bind(contact.created_at)
                .execute(db)
                .await
                .map(|_| ())?
        });
        Ok(contact)
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts")
                .fetch_one(db)
                .await?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    #[tokio::test]
    async fn test_insert_and_count() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqlxContactRepository::new(pool);

        assert_eq!(repo.count().await.unwrap(), 0);
        let saved = repo
            .insert(&ContactSubmission {
                full_name: "Sam Reader".into(),
                email: "sam@example.com".into(),
                subject_type: "News Tip".into(),
                message: "The library is closing early.".into(),
            })
            .await
            .unwrap();
        assert!(!saved.id.is_empty());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
