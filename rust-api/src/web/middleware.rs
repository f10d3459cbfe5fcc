//! Request logging and metrics middleware.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::metrics::record_http_request;

/// Logs one `request_processed` event per request and records its metrics.
///
/// Metrics are labelled with the route template rather than the raw path so
/// unknown URLs do not create new series.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(req).await;

    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();

    record_http_request(&route, status, latency_ms);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        latency_ms = (latency_ms * 100.0).round() / 100.0,
        "request_processed"
    );

    response
}
