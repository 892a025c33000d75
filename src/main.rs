//! Folklore Archive Backend
//!
//! Ingestion and catalog-query service for folklore items, backed by SQLite.

mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod errors;
mod ingest;
mod models;
mod rate_limit;
mod search;
mod validate;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::Authenticator;
use config::{Config, LogFormat};
use db::Repository;
use rate_limit::RateLimiter;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub rate_limiter: Arc<RateLimiter>,
    pub authenticator: Arc<Authenticator>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!("Starting Folklore Archive Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window.as_secs(),
        "Ingestion rate limit"
    );

    if config.api_key.is_none() {
        tracing::warn!(
            "No API key configured (FOLKLORE_API_KEY). Ingestion will refuse every request!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Bring stored search tokens in line with the current tokenizer
    let rewritten = repo.refresh_all_search_tokens().await?;
    tracing::info!("Search tokens refreshed for {} items", rewritten);

    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    rate_limiter.spawn_cleanup(config.rate_limit.cleanup_interval);

    // Create application state
    let state = AppState {
        repo,
        rate_limiter,
        authenticator: Arc::new(Authenticator::new(config.api_key.clone())),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Items
        .route("/items", post(api::create_item).get(api::list_items))
        .route("/items/query", post(api::query_items))
        .route("/items/{id}", get(api::get_item))
        // Facets
        .route("/facets", get(api::facets));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
