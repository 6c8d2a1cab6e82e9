//! API layer
//!
//! Read-only JSON handlers for:
//! - Post feed and single posts
//! - User profiles, authored posts and follow lists
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod posts;
mod users;

pub use dto::{PageParams, PageResponse};
pub use metrics::metrics_router;

use axum::{Router, routing::get};

use crate::AppState;

/// Create JSON API router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(posts::list_posts))
        .route("/posts/:id", get(posts::get_post))
        .route("/users/:name", get(users::get_user))
        .route("/users/:name/posts", get(users::user_posts))
        .route("/users/:name/followers", get(users::followers))
        .route("/users/:name/following", get(users::following))
}
