//! kvblog - a blog core on top of a key-value store
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Read-only JSON endpoints                                 │
//! │  - Prometheus metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Permission checks                                        │
//! │  - Read models (user, post, follow lists)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - User and post repositories                               │
//! │  - Author name cache (moka)                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Key-value store                            │
//! │  - In-memory or SQLite (sqlx)                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Repositories, key scheme and record codecs
//! - `store`: Key-value store contract and backends
//! - `pagination`: Page windows and page-number links
//! - `auth`: Roles and permission bitmasks
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod pagination;
pub mod service;
pub mod store;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Key-value store backend
    pub store: Arc<dyn store::KeyValueStore>,

    /// Registration, profiles and follow edges
    pub accounts: service::AccountService,

    /// Publishing and single-post reads
    pub posts: service::PostService,

    /// Paged feeds and follow lists
    pub timeline: service::TimelineService,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Open the configured key-value store
    /// 2. Wire repositories, cache and services
    ///
    /// # Errors
    /// Returns error if the store cannot be opened
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let store = store::open(&config.store).await?;
        let state = Self::with_store(config, store);

        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Wire services over an already opened store
    pub fn with_store(config: config::AppConfig, store: Arc<dyn store::KeyValueStore>) -> Self {
        let write_mode = config.store.write_mode;
        let users = data::UserRepository::new(store.clone(), write_mode);
        let posts = data::PostRepository::new(store.clone(), write_mode);
        let author_cache = data::AuthorNameCache::from_config(&config.cache);

        tracing::info!(
            backend = store.backend(),
            write_mode = write_mode.as_str(),
            "Repositories ready"
        );

        Self {
            accounts: service::AccountService::new(
                users.clone(),
                posts.clone(),
                author_cache.clone(),
                config.blog.admin_email.clone(),
            ),
            posts: service::PostService::new(users.clone(), posts.clone(), author_cache.clone()),
            timeline: service::TimelineService::new(users, posts, author_cache, &config.blog),
            config: Arc::new(config),
            store,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
