//! HTTP boundary.
//!
//! This module provides:
//! - `POST /webhook` for signed inbound messages
//! - `GET /messages` and `GET /stats` for reads
//! - Liveness, readiness and Prometheus endpoints

pub mod handlers;
pub mod middleware;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health_live, health_ready, list_messages, stats, webhook, AppState, StatusResponse,
};
pub use signature::{compute_signature, verify_signature, SignatureError, SIGNATURE_HEADER};

use crate::metrics::metrics_handler;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/webhook", post(webhook))
        .route("/messages", get(list_messages))
        .route("/stats", get(stats))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(middleware::track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
