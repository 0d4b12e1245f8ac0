//! Database repositories
//!
//! One repository per table. Every repository has a single SQLx
//! implementation serving both SQLite and PostgreSQL; "no row" is `Ok(None)`.

pub mod article;
pub mod contact;
pub mod journalist;
pub mod media;
pub mod settings;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use contact::{ContactRepository, SqlxContactRepository};
pub use journalist::{JournalistRepository, SqlxJournalistRepository};
pub use media::{MediaRepository, SqlxMediaRepository};
pub use settings::{SettingsRepository, SqlxSettingsRepository};

/// True when a repository error came from a unique constraint
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}
