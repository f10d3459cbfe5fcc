//! Message store: idempotent persistence and queries over the `messages` table.
//!
//! Uniqueness of `message_id` is enforced by the table's primary key. The
//! existence check in [`MessageStore::insert_if_absent`] is only a fast path;
//! a concurrent writer that slips past it is stopped by the constraint, and
//! that rejected write is what reports [`InsertOutcome::Duplicate`].

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::error::StoreError;
use super::sqlite_pool;
use super::types::{
    decode_ts, encode_ts, InsertOutcome, Message, MessageFilter, MessagePage, MessageRow,
    Pagination, SenderCount, Stats, TOP_SENDERS_LIMIT,
};

const SELECT_COLUMNS: &str =
    "SELECT message_id, from_msisdn, to_msisdn, ts, text, created_at FROM messages";

/// SQLite-backed message store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    /// Connect to `database_url` and create the schema if it does not exist.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = sqlite_pool::connect(database_url, max_connections).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Returns the underlying pool for running queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the `messages` table and its indexes if missing.
    pub async fn init(&self) -> Result<(), StoreError> {
        info!("message_store_schema_init");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                message_id TEXT PRIMARY KEY,
                from_msisdn TEXT NOT NULL,
                to_msisdn TEXT NOT NULL,
                ts TEXT NOT NULL,
                text TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_ts_id ON messages(ts, message_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_from ON messages(from_msisdn)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Round trip to the database; used by readiness checks.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Point lookup by primary key.
    pub async fn get(&self, message_id: &str) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "{SELECT_COLUMNS} WHERE message_id = ?"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Message::try_from).transpose()
    }

    /// Persist `message` unless a row with the same `message_id` exists.
    ///
    /// Safe under concurrent calls with the same id: exactly one caller sees
    /// [`InsertOutcome::Created`], every other caller sees
    /// [`InsertOutcome::Duplicate`].
    pub async fn insert_if_absent(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
        if self.exists(&message.message_id).await? {
            debug!(message_id = %message.message_id, "message_store_exists");
            return Ok(InsertOutcome::Duplicate);
        }

        self.insert(message).await
    }

    /// Plain INSERT; a primary key violation is reported as a duplicate.
    pub(crate) async fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (message_id, from_msisdn, to_msisdn, ts, text, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.message_id)
        .bind(&message.from)
        .bind(&message.to)
        .bind(encode_ts(&message.timestamp))
        .bind(&message.text)
        .bind(encode_ts(&message.received_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(message_id = %message.message_id, "message_store_unique_violation");
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, message_id: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM messages WHERE message_id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Filtered page ordered by `(ts, message_id)` plus the unpaged match count.
    ///
    /// Both queries run in one read transaction so `total` and the page agree.
    pub async fn list(
        &self,
        filter: &MessageFilter,
        page: Pagination,
    ) -> Result<MessagePage, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM messages");
        push_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&mut *tx)
            .await?;

        let mut page_query = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filter(&mut page_query, filter);
        page_query
            .push(" ORDER BY ts ASC, message_id ASC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset).unwrap_or(i64::MAX));
        let rows: Vec<MessageRow> = page_query
            .build_query_as::<MessageRow>()
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        let messages = rows
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            total,
            returned = messages.len(),
            limit = page.limit,
            offset = page.offset,
            "message_store_list"
        );

        Ok(MessagePage { messages, total })
    }

    /// Aggregates over all rows.
    pub async fn stats(&self) -> Result<Stats, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (total_messages, senders_count, first, last): (i64, i64, Option<String>, Option<String>) =
            sqlx::query_as(
                "SELECT COUNT(*), COUNT(DISTINCT from_msisdn), MIN(ts), MAX(ts) FROM messages",
            )
            .fetch_one(&mut *tx)
            .await?;

        let top: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT from_msisdn, COUNT(*) AS message_count
            FROM messages
            GROUP BY from_msisdn
            ORDER BY message_count DESC, from_msisdn ASC
            LIMIT ?
            "#,
        )
        .bind(TOP_SENDERS_LIMIT)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Stats {
            total_messages,
            senders_count,
            top_senders: top
                .into_iter()
                .map(|(from, count)| SenderCount { from, count })
                .collect(),
            first_message_ts: decode_bound("MIN(ts)", first)?,
            last_message_ts: decode_bound("MAX(ts)", last)?,
        })
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("message_store_closed");
    }
}

fn push_filter<'a>(query: &mut QueryBuilder<'a, Sqlite>, filter: &'a MessageFilter) {
    query.push(" WHERE 1=1");

    if let Some(from) = &filter.from {
        query.push(" AND from_msisdn = ").push_bind(from.as_str());
    }

    if let Some(since) = &filter.since {
        query.push(" AND ts >= ").push_bind(encode_ts(since));
    }

    if let Some(needle) = &filter.text_contains {
        query
            .push(" AND text LIKE ")
            .push_bind(like_pattern(needle))
            .push(" ESCAPE '\\'");
    }
}

/// `%needle%` with LIKE wildcards in the needle matched literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn decode_bound(column: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match raw {
        None => Ok(None),
        Some(raw) => decode_ts(&raw)
            .map(Some)
            .ok_or_else(|| StoreError::CorruptRow {
                message_id: String::new(),
                reason: format!("unparsable {column}: {raw}"),
            }),
    }
}
