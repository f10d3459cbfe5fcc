//! Prometheus metrics.
//!
//! Registered in the default registry and exposed on `GET /metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec,
    TextEncoder,
};
use tracing::error;

lazy_static! {
    /// HTTP requests by route and status code
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["path", "status"]
    )
    .expect("http_requests_total registers once");

    /// Webhook outcomes: created, duplicate, invalid_signature, validation_error, error
    pub static ref WEBHOOK_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "webhook_requests_total",
        "Total number of webhook requests by outcome",
        &["result"]
    )
    .expect("webhook_requests_total registers once");

    pub static ref REQUEST_LATENCY_MS: Histogram = register_histogram!(
        "request_latency_ms",
        "HTTP request latency in milliseconds",
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .expect("request_latency_ms registers once");
}

pub fn record_http_request(path: &str, status: u16, latency_ms: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[path, &status.to_string()])
        .inc();
    REQUEST_LATENCY_MS.observe(latency_ms);
}

pub fn record_webhook(result: &str) {
    WEBHOOK_REQUESTS_TOTAL.with_label_values(&[result]).inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics_encode_failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}
