//! Configuration module for environment variable parsing.
//!
//! The configuration is read once at startup and shared read-only between
//! request handlers behind an `Arc`.

use std::env;
use tracing::warn;

/// Default SQLite location, relative to the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/app.db";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret used to verify `X-Signature` on inbound webhooks
    pub webhook_secret: Option<String>,

    /// SQLite connection URL (`sqlite://path/to/file.db` or `sqlite::memory:`)
    pub database_url: String,

    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Upper bound on pooled SQLite connections
    pub db_max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Config {
            webhook_secret: lookup("WEBHOOK_SECRET"),

            database_url: lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),

            log_level: lookup("LOG_LEVEL")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "info".to_string()),

            port: parse_or("PORT", lookup("PORT"), 8000),

            db_max_connections: parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5)
                .max(1),
        }
    }

    /// The webhook secret, if one is configured and not blank.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
    }

    /// Whether inbound webhooks can be verified at all.
    pub fn is_secret_configured(&self) -> bool {
        self.webhook_secret().is_some()
    }
}

/// Parse a numeric variable, falling back to `default` on absence or garbage.
fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    let raw = match raw {
        Some(v) => v,
        None => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid numeric value, using default");
            default
        }
    }
}
