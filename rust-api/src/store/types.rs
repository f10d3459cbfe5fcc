//! Message types shared by the store, the ingestion path and the query engine.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::Serialize;

use super::error::StoreError;

/// Maximum length of the optional `text` field, in characters.
pub const MAX_TEXT_LEN: usize = 4096;

/// Number of senders reported by [`Stats::top_senders`].
pub const TOP_SENDERS_LIMIT: i64 = 10;

/// A persisted inbound message.
///
/// Serializes to the public listing shape:
/// `{"message_id", "from", "to", "ts", "text"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message_id: String,
    pub from: String,
    pub to: String,
    /// Caller-supplied event time, used for ordering and `since` filters
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub text: Option<String>,
    /// Server-assigned insert time
    #[serde(skip)]
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time as `received_at`.
    pub fn new(
        message_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        timestamp: DateTime<Utc>,
        text: Option<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            from: from.into(),
            to: to.into(),
            timestamp,
            text,
            received_at: Utc::now(),
        }
    }
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Duplicate,
}

impl InsertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            InsertOutcome::Created => "created",
            InsertOutcome::Duplicate => "duplicate",
        }
    }

    pub fn is_duplicate(self) -> bool {
        matches!(self, InsertOutcome::Duplicate)
    }
}

/// Conjunction of optional listing filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Exact match on sender
    pub from: Option<String>,
    /// Inclusive lower bound on `ts`
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive substring of `text`
    pub text_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
}

/// One page of messages plus the number of rows matching the filter.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    pub from: String,
    pub count: i64,
}

/// Aggregates over every stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total_messages: i64,
    pub senders_count: i64,
    /// Busiest senders, count descending then sender ascending
    pub top_senders: Vec<SenderCount>,
    pub first_message_ts: Option<DateTime<Utc>>,
    pub last_message_ts: Option<DateTime<Utc>>,
}

/// Parse a caller-supplied timestamp.
///
/// Accepts RFC 3339 (`2024-01-01T10:00:00Z`, `2024-01-01T12:00:00+02:00`).
/// Timestamps without an offset are taken as UTC. The UTC year must fall in
/// `0..=9999` so the stored form stays fixed-width.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc()),
    };
    parsed.filter(|ts| (0..=9999).contains(&ts.year()))
}

/// Fixed-width UTC encoding; lexical order equals chronological order.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

pub(crate) fn decode_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Raw `messages` row as stored in SQLite.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub message_id: String,
    pub from_msisdn: String,
    pub to_msisdn: String,
    pub ts: String,
    pub text: Option<String>,
    pub created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let corrupt = |column: &str, value: &str| StoreError::CorruptRow {
            message_id: row.message_id.clone(),
            reason: format!("unparsable {column}: {value}"),
        };
        let timestamp = decode_ts(&row.ts).ok_or_else(|| corrupt("ts", &row.ts))?;
        let received_at =
            decode_ts(&row.created_at).ok_or_else(|| corrupt("created_at", &row.created_at))?;

        Ok(Message {
            message_id: row.message_id,
            from: row.from_msisdn,
            to: row.to_msisdn,
            timestamp,
            text: row.text,
            received_at,
        })
    }
}
