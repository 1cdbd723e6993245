//! kiln server entry point.

use kiln_core::Executor;
use kiln_server::{http, AppState, ServerConfig};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("kiln_server=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting kiln server");

    let config = ServerConfig::from_env();
    tracing::info!(?config, "Configuration loaded");
    config.validate()?;

    let executor_config = config.executor_config()?;
    let executor = match &config.docker_socket {
        Some(socket) => Executor::docker_at(socket, executor_config)?,
        None => Executor::docker(executor_config)?,
    };
    let executor = Arc::new(executor);

    // Reachability is reported, not required: requests fail cleanly until Docker is up
    if executor.health_check().await {
        tracing::info!("Docker is running");
    } else {
        tracing::warn!("Docker is not available");
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = AppState::new(Arc::clone(&executor), config.max_input_bytes);
    let http_addr = config.http_addr;
    let mut shutdown_rx = shutdown_tx.subscribe();
    let http_handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
        };

        if let Err(e) = http::serve(state, http_addr, shutdown).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!(http_addr = %config.http_addr, "Server ready");

    signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, draining in-flight executions...");

    // Refuse new sandboxes; running ones finish and tear themselves down
    executor.shutdown();
    let _ = shutdown_tx.send(());

    let _ = http_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}
