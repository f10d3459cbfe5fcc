//! HTTP endpoint handlers.
//!
//! Handlers are thin: they pull what they need out of the request and hand
//! it to the ingestion pipeline or the query engine.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    response::Redirect,
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::ingest;
use crate::query::{self, ListParams, MessageListResponse, StatsResponse};
use crate::store::MessageStore;
use crate::web::signature::SIGNATURE_HEADER;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: MessageStore,
}

impl AppState {
    pub fn new(config: Config, store: MessageStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

/// Plain `{"status": "ok"}` body.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { status: "ok" })
    }
}

// =============================================================================
// Webhook
// =============================================================================

/// `POST /webhook`
///
/// The body is taken as raw bytes so the signature is checked against
/// exactly what the sender signed.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    ingest::ingest(&state.config, &state.store, signature, &body).await?;

    Ok(StatusResponse::ok())
}

// =============================================================================
// Queries
// =============================================================================

/// `GET /messages`
pub async fn list_messages(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let Query(params) = params.map_err(|e| {
        warn!(error = %e, "messages_query_rejected");
        ApiError::invalid("query", e.body_text())
    })?;

    Ok(Json(query::list_messages(&state.store, params).await?))
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(query::get_stats(&state.store).await?))
}

// =============================================================================
// Health
// =============================================================================

/// `GET /health/live`: the process is up.
pub async fn health_live() -> Json<StatusResponse> {
    StatusResponse::ok()
}

/// `GET /health/ready`: the secret is configured and storage answers.
pub async fn health_ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    if !state.config.is_secret_configured() {
        warn!("readiness_secret_missing");
        return Err(ApiError::ServiceMisconfigured);
    }

    if let Err(e) = state.store.ping().await {
        error!(error = %e, "readiness_storage_unreachable");
        return Err(ApiError::Unavailable);
    }

    Ok(StatusResponse::ok())
}

/// `GET /`
pub async fn root() -> Redirect {
    Redirect::temporary("/messages")
}
