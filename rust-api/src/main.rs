//! Msgsink API server - signed webhook ingestion and message queries.
//!
//! Loads configuration from the environment (and `.env` when present),
//! opens the SQLite store, and serves the HTTP API until SIGINT/SIGTERM.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use msgsink::{router, AppState, Config, MessageStore};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    // Load configuration
    let config = Config::from_env();

    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("api_server_starting");
    info!(
        port = config.port,
        database_url = %config.database_url,
        db_max_connections = config.db_max_connections,
        webhook_secret_configured = config.is_secret_configured(),
        dotenv_loaded,
        "config_loaded"
    );

    if !config.is_secret_configured() {
        // Keep serving so /health/ready can report the misconfiguration.
        error!("webhook_secret_missing");
    }

    let store = MessageStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to open message store")?;
    info!("message_store_ready");

    let state = AppState::new(config.clone(), store.clone());
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "api_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;

    info!("api_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("api_server_shutting_down");
}
