//! Storage error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be reached (pool exhausted or closed, I/O failure).
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("corrupt row for message {message_id}: {reason}")]
    CorruptRow { message_id: String, reason: String },
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err),
            other => StoreError::Database(other),
        }
    }
}
