// src/server/mod.rs

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, reload};

use crate::config::MasterConfig;

mod context;
mod initialization;
mod metrics_server;
mod spawner;

/// The main server startup function, orchestrating all setup phases: build
/// `MasterState` and run it through leader election, spawn the RPC server,
/// metrics server and background maintenance tasks, then block until a
/// shutdown signal arrives.
pub async fn run(config: MasterConfig, log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>) -> Result<()> {
    let mut server_context = initialization::setup(config, log_reload_handle).await?;

    spawner::spawn_all(&mut server_context).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping background tasks.");
    let _ = server_context.shutdown_tx.send(());

    while let Some(result) = server_context.background_tasks.join_next().await {
        match result {
            Ok(Err(e)) => tracing::error!("A background task exited with an error: {}", e),
            Err(e) => tracing::error!("A background task panicked during shutdown: {}", e),
            Ok(Ok(())) => {}
        }
    }

    info!("Catalog manager shut down cleanly.");
    Ok(())
}
