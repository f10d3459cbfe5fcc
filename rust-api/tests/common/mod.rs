//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use msgsink::{store::parse_timestamp, Config, Message, MessageStore};

pub const SECRET: &str = "testsecret";

/// A store backed by a fresh on-disk database; keep the `TempDir` alive.
pub async fn temp_store() -> (MessageStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("app.db").display());
    let store = MessageStore::connect(&url, 5)
        .await
        .expect("Failed to create store");
    (store, dir)
}

pub fn test_config(secret: Option<&str>) -> Config {
    Config {
        webhook_secret: secret.map(str::to_string),
        database_url: "sqlite::memory:".to_string(),
        log_level: "debug".to_string(),
        port: 0,
        db_max_connections: 5,
    }
}

pub fn ts(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).expect("valid timestamp")
}

pub fn message(id: &str, from: &str, at: &str, text: Option<&str>) -> Message {
    Message::new(id, from, "+999", ts(at), text.map(str::to_string))
}
