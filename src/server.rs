//! HTTP server initialization and runtime setup.
//!
//! Builds the logger from configuration, installs it process-wide and serves
//! the router until Ctrl+C.

use crate::config::Config;
use crate::routes::app_router;

use anyhow::{Context, Result};
use std::net::SocketAddr;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Structured logger (stdout, plus file when enabled)
/// - Axum HTTP server with request logging
///
/// # Errors
///
/// Returns an error if:
/// - The log level is invalid
/// - A global logger is already installed
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let logger = config.logger_config()?.build();
    logger.init().context("Failed to install logger")?;
    config.print_summary();

    let app = app_router(logger);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C; never resolves if the signal handler can't be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
