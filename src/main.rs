//! kvblog binary entry point

use kvblog::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging; RUST_LOG overrides the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter_directive().into());

    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting kvblog...");
    tracing::info!(
        backend = ?config.store.backend,
        write_mode = config.store.write_mode.as_str(),
        posts_per_page = config.blog.posts_per_page,
        log_level = %config.logging.level,
        "Configuration loaded"
    );

    if config.store.backend == kvblog::config::StoreBackend::Memory {
        tracing::warn!("Using the in-memory store; data is lost on restart");
    }

    // 3. Initialize metrics
    kvblog::metrics::init_metrics();

    // 4. Initialize application state
    let addr = config.server.bind_address();
    let state = AppState::new(config).await?;

    // 5. Build Axum router
    let app = kvblog::build_router(state);

    // 6. Start HTTP server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
