//! Newsdesk - student newsroom CMS server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsdesk::{
    api::{self, AppState},
    config::{Config, StorageDriver},
    db,
    platform::{create_storage, http_client, AuthProvider, PlatformAuth},
    services::SessionEvent,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Newsdesk...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Platform clients
    let client = http_client(config.platform.request_timeout_secs)?;
    let auth: Option<Arc<dyn AuthProvider>> = match config.platform.credentials() {
        Some(credentials) => Some(Arc::new(PlatformAuth::new(client.clone(), &credentials))),
        None => {
            tracing::warn!("Platform credentials missing; sign-in and invites are disabled");
            None
        }
    };

    let storage = create_storage(&config, client);
    if config.storage.driver == StorageDriver::Platform || config.platform.is_complete() {
        match storage.ensure_bucket().await {
            Ok(true) => tracing::info!("Created storage bucket '{}'", storage.bucket()),
            Ok(false) => tracing::info!("Storage bucket '{}' ready", storage.bucket()),
            Err(e) => tracing::warn!("Could not verify storage bucket '{}': {}", storage.bucket(), e),
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(pool, config, auth, storage)?;

    // Start rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Session audit log
    {
        let mut events = state.sessions.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SignedIn { session_id, user_id }) => {
                        tracing::info!(%session_id, %user_id, "session started");
                    }
                    Ok(SessionEvent::SignedOut { session_id, user_id }) => {
                        tracing::info!(%session_id, %user_id, "session ended");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Session log skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
