//! Webhook ingestion pipeline.
//!
//! ## Processing Flow
//!
//! ```text
//! raw body → verify_signature() → parse_payload() → insert_if_absent() → Created | Duplicate
//! ```
//!
//! A signature failure short-circuits before the body is parsed or the store
//! is touched. Created and duplicate deliveries look identical to the sender;
//! only the logs and the `webhook_requests_total` metric tell them apart.

pub mod payload;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::metrics::record_webhook;
use crate::store::{InsertOutcome, MessageStore};
use crate::web::signature::{verify_signature, SignatureError};

pub use payload::{parse_payload, WebhookPayload};

/// Verify, validate and idempotently persist one webhook delivery.
pub async fn ingest(
    config: &Config,
    store: &MessageStore,
    signature: Option<&str>,
    body: &[u8],
) -> Result<InsertOutcome, ApiError> {
    if let Err(e) = verify_signature(config.webhook_secret(), body, signature) {
        let result = match e {
            SignatureError::SecretNotConfigured => "error",
            SignatureError::Missing | SignatureError::Mismatch => "invalid_signature",
        };
        record_webhook(result);
        return Err(e.into());
    }

    let message = parse_payload(body).map_err(|errors| {
        warn!(
            violations = errors.len(),
            fields = ?errors.iter().map(|e| e.field.as_str()).collect::<Vec<_>>(),
            "webhook_validation_failed"
        );
        record_webhook("validation_error");
        ApiError::InvalidPayload(errors)
    })?;

    let outcome = store.insert_if_absent(&message).await.map_err(|e| {
        error!(message_id = %message.message_id, error = %e, "webhook_store_failed");
        record_webhook("error");
        ApiError::from(e)
    })?;

    match outcome {
        InsertOutcome::Created => info!(
            message_id = %message.message_id,
            dup = false,
            result = outcome.as_str(),
            "webhook_created"
        ),
        InsertOutcome::Duplicate => info!(
            message_id = %message.message_id,
            dup = true,
            result = outcome.as_str(),
            "webhook_duplicate"
        ),
    }
    record_webhook(outcome.as_str());

    Ok(outcome)
}
