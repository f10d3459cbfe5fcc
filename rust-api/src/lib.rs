//! Msgsink - signed webhook ingestion and query service.
//!
//! Inbound message events are verified with an HMAC-SHA256 signature,
//! persisted idempotently in SQLite keyed by `message_id`, and served back
//! through filtered listing and aggregate statistics endpoints.
//!
//! ## Architecture
//!
//! ```text
//! POST /webhook → signature → ingest → MessageStore (insert_if_absent)
//! GET /messages, /stats → query → MessageStore (list, stats)
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, FieldError};
pub use ingest::ingest;
pub use store::{InsertOutcome, Message, MessageFilter, MessageStore, Pagination, StoreError};
pub use web::{router, AppState};
