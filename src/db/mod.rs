//! Database layer
//!
//! Supports:
//! - SQLite (default, for single-binary deployment and tests)
//! - PostgreSQL (the managed platform's datastore)
//!
//! Repositories share one SQL text per query across both drivers: `$n`
//! placeholders are understood by both, and every statement binds its
//! parameters in ascending order of first appearance.
//!
//! # Usage
//!
//! ```ignore
//! use newsdesk::config::DatabaseConfig;
//! use newsdesk::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

use chrono::{DateTime, SubsecRound, Utc};

/// Run the same sqlx expression against whichever concrete pool backs a
/// [`DynDatabasePool`]. The body is expanded once per driver, so
/// `sqlx::query_as::<_, T>` infers the right database in each arm.
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {
        match $db.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $pool = $db
                    .as_sqlite()
                    .ok_or_else(|| ::anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Postgres => {
                let $pool = $db
                    .as_postgres()
                    .ok_or_else(|| ::anyhow::anyhow!("PostgreSQL pool unavailable"))?;
                $body
            }
        }
    };
}

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, PostgresDatabase,
    SqliteDatabase,
};

/// Current time at the precision PostgreSQL stores, so a value read back
/// compares equal to the one written.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
