//! User endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use super::dto::{PageParams, PageResponse};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{PostView, UserSummary, UserView};

/// GET /api/users/:name
pub async fn get_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<UserView>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/users/:name"])
        .start_timer();

    let user = state.accounts.get_by_name(&name).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/users/:name", "200"])
        .inc();

    Ok(Json(user))
}

/// GET /api/users/:name/posts
pub async fn user_posts(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<PostView>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/users/:name/posts"])
        .start_timer();

    let pagination = state
        .timeline
        .author_posts_page(&name, params.page())
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/users/:name/posts", "200"])
        .inc();

    Ok(Json(pagination.into()))
}

/// GET /api/users/:name/followers
pub async fn followers(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<UserSummary>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/users/:name/followers"])
        .start_timer();

    let pagination = state.timeline.followers_page(&name, params.page()).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/users/:name/followers", "200"])
        .inc();

    Ok(Json(pagination.into()))
}

/// GET /api/users/:name/following
pub async fn following(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<UserSummary>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/users/:name/following"])
        .start_timer();

    let pagination = state.timeline.following_page(&name, params.page()).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/users/:name/following", "200"])
        .inc();

    Ok(Json(pagination.into()))
}
