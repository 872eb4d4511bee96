//! Request metric tracking

use axum::{extract::Request, middleware::Next, response::Response};
use chatdock_common::metrics::RequestMetrics;

/// Record count and latency for every request that passes through the router
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let tracker = RequestMetrics::start(request.method().as_str(), request.uri().path());

    let response = next.run(request).await;

    tracker.finish(response.status().as_u16());
    response
}
