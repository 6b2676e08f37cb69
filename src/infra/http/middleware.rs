use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::{application::error::ErrorReport, domain::engagement::ViewerId};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag the request with an id and run the rest of the stack inside a span
/// carrying it, so every event logged for the request shares the id.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(span).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Log 4xx and 5xx responses together with the error chain the handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let query = request.uri().query().map(str::to_owned);

    let mut response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let viewer = response
        .extensions()
        .get::<ViewerId>()
        .map(ToString::to_string);
    let (source, chain) = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = chain
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    if status.is_server_error() {
        error!(
            target = "likefeed::http::response",
            status = status.as_u16(),
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            viewer = viewer.as_deref(),
            query = query.as_deref(),
            "request failed",
        );
    } else {
        warn!(
            target = "likefeed::http::response",
            status = status.as_u16(),
            elapsed_ms,
            source,
            detail,
            viewer = viewer.as_deref(),
            query = query.as_deref(),
            "request rejected",
        );
    }

    response
}
