//! SQLite connection pool setup.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool for the given database URL (file path or in-memory).
///
/// The database file and its parent directory are created if missing. File
/// databases run in WAL mode so readers never block the single writer.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    info!(database_url = %database_url, max_connections, "sqlite_pool_initializing");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    if !in_memory {
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
    if in_memory {
        // The shared in-memory database lives only while a connection is open.
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await?;

    info!("sqlite_pool_ready");
    Ok(pool)
}
