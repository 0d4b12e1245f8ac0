//! API layer - HTTP handlers and routing
//!
//! - `/api/v1` JSON API: public reads, contact form, sign-in, and the admin
//!   surface behind `require_auth`
//! - `/api/invite-journalist` privileged invite endpoint
//! - Server-rendered public site and admin console
//! - `/assets` embedded stylesheets, `/uploads` local storage

pub mod admin;
pub mod articles;
pub mod auth;
pub mod invite;
pub mod journalists;
pub mod middleware;
pub mod pages;
pub mod site;
pub mod static_files;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{any, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let body_limit = usize::try_from(
        state
            .config
            .upload
            .max_file_size
            .saturating_add(MULTIPART_OVERHEAD),
    )
    .unwrap_or(usize::MAX);

    // Admin routes (need a signed-in account)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .nest("/admin/articles", articles::admin_router())
        .nest("/admin/journalists", journalists::admin_router())
        .nest(
            "/admin/media",
            upload::media_router().layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest(
            "/admin/upload",
            upload::upload_router().layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest("/admin/settings", site::settings_router())
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/articles", articles::public_router())
        .nest("/journalists", journalists::public_router())
        .nest("/auth", auth::public_router())
        .route("/site", get(site::get_site_info))
        .route("/contact", post(site::submit_contact))
        .merge(admin_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) if cors_origin != "*" => cors.allow_origin(origin).allow_credentials(true),
        Ok(_) => cors.allow_origin(Any),
        Err(e) => {
            tracing::warn!("Invalid CORS origin '{}' ({}); allowing any origin", cors_origin, e);
            cors.allow_origin(Any)
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    let uploads = ServeDir::new(&state.config.storage.local_path);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(pages::public_router())
        .merge(pages::admin_router(state.clone()))
        .route("/assets/{*path}", get(static_files::serve_asset))
        .nest_service("/uploads", uploads)
        .layer(cors)
        // Answers its own preflight, so it sits outside the CORS layer
        .route("/api/invite-journalist", any(invite::invite_journalist))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
