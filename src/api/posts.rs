//! Post endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use super::dto::{PageParams, PageResponse};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::PostView;

/// GET /api/posts
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<PostView>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/posts"])
        .start_timer();

    let pagination = state.timeline.posts_page(params.page()).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/posts", "200"])
        .inc();

    Ok(Json(pagination.into()))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PostView>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/posts/:id"])
        .start_timer();

    let post = state.posts.get(id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/posts/:id", "200"])
        .inc();

    Ok(Json(post))
}
