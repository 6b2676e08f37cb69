//! Feed handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use likefeed_api_types::{
    HealthResponse, PostCreateRequest, PostListQuery, PostListResponse, PostUpdateRequest,
};
use tracing::warn;

use crate::application::repos::PageRequest;
use crate::domain::engagement::ViewerId;

use super::error::ApiError;
use super::models::{authored_post_to_api, engagement_to_api, post_view_to_api};
use super::state::ApiState;

pub async fn list_posts(
    State(state): State<ApiState>,
    Extension(viewer): Extension<ViewerId>,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .feed
        .list_posts(&viewer, PageRequest::new(query.limit, query.offset))
        .await?;

    Ok(Json(PostListResponse {
        posts: page.posts.into_iter().map(post_view_to_api).collect(),
        engagement_degraded: page.engagement_degraded,
    }))
}

pub async fn create_post(
    State(state): State<ApiState>,
    Extension(viewer): Extension<ViewerId>,
    Json(payload): Json<PostCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.feed.create_post(&viewer, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(post_view_to_api(view))))
}

pub async fn update_post(
    State(state): State<ApiState>,
    Extension(viewer): Extension<ViewerId>,
    Path(id): Path<String>,
    Json(payload): Json<PostUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.feed.update_post(&viewer, &id, &payload.body).await?;
    Ok(Json(authored_post_to_api(post, None)))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    Extension(viewer): Extension<ViewerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.feed.delete_post(&viewer, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<ApiState>,
    Extension(viewer): Extension<ViewerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.feed.toggle_like(&viewer, &id).await?;
    Ok(Json(engagement_to_api(view)))
}

pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "database health check failed");
            false
        }
    };
    let cache = match state.feed.engagement().ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(
                backend = state.feed.engagement().backend_name(),
                error = %err,
                "cache health check failed"
            );
            false
        }
    };

    let status = if database && cache {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse { database, cache }))
}
