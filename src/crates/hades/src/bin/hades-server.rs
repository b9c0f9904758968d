//! Hades server binary
//!
//! Serves the tracking and rollback API over HTTP.

use clap::Parser;
use hades::{api::create_router, config, logging, RollbackEngine};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hades-server")]
#[command(about = "Hades rollback agent HTTP server", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Explicit configuration file, applied after the standard locations
    #[arg(short, long, env = "HADES_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured bind address (host:port)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = config::load_config(args.config.as_deref()).await?;
    logging::init(&config.logging);
    tracing::info!("Configuration loaded");

    let addr: SocketAddr = args
        .bind
        .unwrap_or_else(|| config.server_addr())
        .parse()?;

    tracing::info!(database = %config.database.url, row_store = %config.row_store.url, "Connecting to stores");
    let engine = Arc::new(RollbackEngine::from_config(&config).await?);
    engine.health_check().await?;

    let app = create_router(engine.clone());

    tracing::info!("Starting hades server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.repository().database().close().await;
    tracing::info!("Hades server shut down gracefully");
    Ok(())
}

/// Signal for graceful shutdown (Ctrl-C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL-C signal handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received CTRL-C signal, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down");
        }
    }
}
