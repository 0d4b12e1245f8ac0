//! Provision a journalist with a confirmed login account.
//!
//! Usage: `cargo run --bin create-journalist -- <email> <password> <name> [role] [department]`
//!
//! Any argument may instead come from `NEWSDESK_SEED_EMAIL`,
//! `NEWSDESK_SEED_PASSWORD`, `NEWSDESK_SEED_NAME`, `NEWSDESK_SEED_ROLE` and
//! `NEWSDESK_SEED_DEPARTMENT`. The role defaults to "Editor in Chief" so the
//! first account can invite everyone else.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use newsdesk::config::Config;
use newsdesk::db::{self, repositories::SqlxJournalistRepository};
use newsdesk::platform::{http_client, AuthProvider, PlatformAuth};
use newsdesk::services::{AccountInput, JournalistService};

fn arg_or_env(args: &[String], index: usize, var: &str) -> Option<String> {
    args.get(index)
        .cloned()
        .or_else(|| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let input = AccountInput {
        email: arg_or_env(&args, 0, "NEWSDESK_SEED_EMAIL").context("email is required")?,
        password: arg_or_env(&args, 1, "NEWSDESK_SEED_PASSWORD")
            .context("password is required")?,
        name: arg_or_env(&args, 2, "NEWSDESK_SEED_NAME").context("name is required")?,
        role: arg_or_env(&args, 3, "NEWSDESK_SEED_ROLE")
            .unwrap_or_else(|| "Editor in Chief".to_string()),
        department: arg_or_env(&args, 4, "NEWSDESK_SEED_DEPARTMENT"),
    };

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let credentials = config
        .platform
        .credentials()
        .context("Platform url, anon key, and service role key are required")?;

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let client = http_client(config.platform.request_timeout_secs)?;
    let auth: Arc<dyn AuthProvider> = Arc::new(PlatformAuth::new(client, &credentials));
    let service = JournalistService::new(SqlxJournalistRepository::boxed(pool), Some(auth));

    let journalist = service.provision_account(input).await?;
    println!(
        "Journalist {} ({}) ready as {}",
        journalist.name,
        journalist.email.as_deref().unwrap_or("-"),
        journalist.role
    );
    Ok(())
}
