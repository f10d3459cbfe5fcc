//! Query engine: listing with filters and pagination, and aggregate stats.
//!
//! Query parameters arrive as raw strings and are validated here so that an
//! out-of-range `limit` or `offset` is a 422, never silently clamped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, FieldError};
use crate::store::{
    parse_timestamp, Message, MessageFilter, MessageStore, Pagination, SenderCount,
};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

/// Raw `GET /messages` query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub from: Option<String>,
    pub since: Option<String>,
    pub q: Option<String>,
}

/// Validated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub filter: MessageFilter,
    pub pagination: Pagination,
}

impl ListParams {
    pub fn validate(self) -> Result<ListRequest, Vec<FieldError>> {
        let mut errors = Vec::new();

        let limit = match self.limit.as_deref().map(str::trim) {
            None => Some(DEFAULT_LIMIT),
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if (1..=MAX_LIMIT).contains(&n) => Some(n),
                _ => {
                    errors.push(FieldError::new(
                        "limit",
                        format!("must be an integer between 1 and {MAX_LIMIT}"),
                    ));
                    None
                }
            },
        };

        let offset = match self.offset.as_deref().map(str::trim) {
            None => Some(0),
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.push(FieldError::new("offset", "must be a non-negative integer"));
                    None
                }
            },
        };

        let since = match non_empty(self.since) {
            None => None,
            Some(raw) => {
                let parsed = parse_timestamp(&raw);
                if parsed.is_none() {
                    errors.push(FieldError::new("since", "must be an RFC 3339 date-time"));
                }
                parsed
            }
        };

        match (limit, offset) {
            (Some(limit), Some(offset)) if errors.is_empty() => Ok(ListRequest {
                filter: MessageFilter {
                    from: non_empty(self.from).map(restore_plus),
                    since,
                    text_contains: non_empty(self.q),
                },
                pagination: Pagination { limit, offset },
            }),
            _ => Err(errors),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// An unencoded `+` in a query string decodes to a space; `from= 111`
/// can only have meant `+111`.
fn restore_plus(from: String) -> String {
    match from.strip_prefix(' ') {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            format!("+{digits}")
        }
        _ => from,
    }
}

/// `GET /messages` response body.
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub data: Vec<Message>,
    pub total: i64,
    pub limit: u32,
    pub offset: u64,
}

/// `GET /stats` response body.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_messages: i64,
    pub senders_count: i64,
    pub messages_per_sender: Vec<SenderCount>,
    pub first_message_ts: Option<DateTime<Utc>>,
    pub last_message_ts: Option<DateTime<Utc>>,
}

/// Validate `params` and fetch one page of messages.
pub async fn list_messages(
    store: &MessageStore,
    params: ListParams,
) -> Result<MessageListResponse, ApiError> {
    let request = params.validate().map_err(ApiError::InvalidPayload)?;
    let page = store.list(&request.filter, request.pagination).await?;

    Ok(MessageListResponse {
        data: page.messages,
        total: page.total,
        limit: request.pagination.limit,
        offset: request.pagination.offset,
    })
}

pub async fn get_stats(store: &MessageStore) -> Result<StatsResponse, ApiError> {
    let stats = store.stats().await?;

    Ok(StatsResponse {
        total_messages: stats.total_messages,
        senders_count: stats.senders_count,
        messages_per_sender: stats.top_senders,
        first_message_ts: stats.first_message_ts,
        last_message_ts: stats.last_message_ts,
    })
}
