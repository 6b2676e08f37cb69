use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::domain::engagement::ViewerId;

use super::error::ApiError;

/// Headers carrying the caller id, in lookup order.
pub const VIEWER_HEADERS: [&str; 2] = ["user-id", "grpc-metadata-user-id"];

fn viewer_header(headers: &HeaderMap) -> Option<&str> {
    VIEWER_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
    })
}

/// Resolve the viewer from request headers and store it on the request and
/// the response so failure logs can name it.
pub async fn require_viewer(mut request: Request<Body>, next: Next) -> Response {
    let Some(raw) = viewer_header(request.headers()) else {
        return ApiError::unauthenticated().into_response();
    };

    let viewer = match ViewerId::parse(raw) {
        Ok(viewer) => viewer,
        Err(err) => {
            warn!(error = %err, "rejected viewer header");
            return ApiError::bad_request("Invalid viewer id", Some(err.to_string()))
                .into_response();
        }
    };

    request.extensions_mut().insert(viewer.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(viewer);
    response
}
