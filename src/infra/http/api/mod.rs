pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    let posts = Router::new()
        .route(
            "/api/v1/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/v1/posts/{id}",
            patch(handlers::update_post).delete(handlers::delete_post),
        )
        .route("/api/v1/posts/{id}/like", post(handlers::toggle_like))
        .route_layer(axum_middleware::from_fn(middleware::require_viewer));

    Router::new()
        .merge(posts)
        .route("/api/v1/health", get(handlers::health))
        .with_state(state)
}
