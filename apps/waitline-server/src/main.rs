//! # Waitline Server
//!
//! HTTP + WebSocket front for the queue engine.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Waitline Server                                  │
//! │                                                                         │
//! │  1. EngineConfig::load(waitline.toml + WAITLINE_* env)                 │
//! │  2. Database::new (SQLite, migrations)                                 │
//! │  3. NotificationDispatcher / EventBus / TimeoutScheduler               │
//! │  4. QueueService::start (recover timers, spawn scheduler worker)       │
//! │  5. axum::serve until Ctrl+C / SIGTERM                                 │
//! │  6. scheduler shutdown, database close                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `waitline-server [path/to/waitline.toml]`

mod error;
mod routes;
mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use waitline_db::{Database, DbConfig};
use waitline_engine::{EngineConfig, EventBus, NotificationDispatcher, QueueService, TimeoutScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Waitline server...");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = EngineConfig::load(config_path)?;
    info!(
        database = %config.database.path.display(),
        port = config.server.port,
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::new(
        DbConfig::new(config.database.path.clone()).max_connections(config.database.max_connections),
    )
    .await?;

    let dispatcher = NotificationDispatcher::from_settings(&config.notify)?;
    let events = EventBus::new(config.events.capacity);
    let scheduler = TimeoutScheduler::new(config.scheduler.sweep_interval());

    let service = Arc::new(QueueService::new(db.clone(), scheduler, dispatcher, events));
    service.start(config.scheduler.recover_timers).await?;

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, routes::router(service.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await?;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
