//! Message storage module.
//!
//! This module provides:
//! - Message, filter and aggregate types
//! - The SQLite-backed [`MessageStore`] with idempotent inserts
//!
//! ## Schema
//!
//! ```text
//! messages(message_id PK, from_msisdn, to_msisdn, ts, text, created_at)
//! ```

pub mod error;
pub mod message_store;
pub mod sqlite_pool;
pub mod types;

pub use error::StoreError;
pub use message_store::MessageStore;
pub use types::{
    parse_timestamp, InsertOutcome, Message, MessageFilter, MessagePage, Pagination,
    SenderCount, Stats, MAX_TEXT_LEN, TOP_SENDERS_LIMIT,
};
