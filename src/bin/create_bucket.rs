//! Create the public media bucket on the platform if it is missing.
//!
//! Usage: `cargo run --bin create-bucket`
//!
//! Reads the same `config.yml` and `NEWSDESK_*` environment as the server.

use anyhow::{bail, Result};
use std::path::Path;

use newsdesk::config::{Config, StorageDriver};
use newsdesk::platform::{create_storage, http_client};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut config = Config::load_with_env(Path::new("config.yml"))?;
    if !config.platform.is_complete() {
        bail!("Platform url, anon key, and service role key are required");
    }
    config.storage.driver = StorageDriver::Platform;

    let client = http_client(config.platform.request_timeout_secs)?;
    let storage = create_storage(&config, client);

    if storage.ensure_bucket().await? {
        println!("Created public bucket '{}'", storage.bucket());
    } else {
        println!("Bucket '{}' already exists", storage.bucket());
    }
    Ok(())
}
