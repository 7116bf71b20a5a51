//! Request-scoped middleware.

use axum::{middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Attach a correlation id to every request and run the rest of the stack
/// inside a request-scoped span, so engine logs line up with the request
/// that caused them.
pub async fn request_span(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let request_id = Uuid::now_v7();
    let span = tracing::info_span!(
        "http_request",
        %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    next.run(req).instrument(span).await
}
