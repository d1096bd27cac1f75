// src/server/spawner.rs

//! Spawns all of the master process's long-running background tasks: the
//! four `core::background` maintenance loops (spec.md §4.10) plus the
//! administrative RPC server and the Prometheus metrics server.

use anyhow::Result;
use tracing::info;

use super::context::ServerContext;
use super::metrics_server;
use crate::core::assignment::AssignmentPassTask;
use crate::core::background::{DeletedTableGcTask, LeaderAffinityTask, PartitionsRebuildTask, TablespaceRefreshTask};
use crate::rpc;

/// Spawns all critical background tasks into the provided `JoinSet`.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    let config = state.config.read().await.clone();

    // --- Metrics server ---
    let metrics_state = state.clone();
    let metrics_port = config.metrics_port;
    let shutdown_rx_metrics = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        metrics_server::run_metrics_server(metrics_state, metrics_port, shutdown_rx_metrics).await;
        Ok(())
    });

    // --- Administrative RPC server ---
    let rpc_state = state.clone();
    let rpc_bind_addr = config.rpc_bind_addr.clone();
    let rpc_port = config.rpc_port;
    let mut shutdown_rx_rpc = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        let app = rpc::router(rpc_state);
        let addr = format!("{rpc_bind_addr}:{rpc_port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Administrative RPC server listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_rx_rpc.recv().await.ok();
                info!("RPC server shutting down.");
            })
            .await?;
        Ok(())
    });

    // --- Tablet assignment pipeline (spec.md §4.6) ---
    let assignment_task = AssignmentPassTask::new(state.clone());
    let shutdown_rx_assignment = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        assignment_task.run(shutdown_rx_assignment).await;
        Ok(())
    });

    // --- Background maintenance tasks (spec.md §4.10) ---
    let gc_task = DeletedTableGcTask::new(state.clone());
    let shutdown_rx_gc = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        gc_task.run(shutdown_rx_gc).await;
        Ok(())
    });

    let tablespace_task = TablespaceRefreshTask::new(state.clone());
    let shutdown_rx_tablespace = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        tablespace_task.run(shutdown_rx_tablespace).await;
        Ok(())
    });

    let partitions_task = PartitionsRebuildTask::new(state.clone());
    let shutdown_rx_partitions = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        partitions_task.run(shutdown_rx_partitions).await;
        Ok(())
    });

    let affinity_task = LeaderAffinityTask::new(state.clone());
    let shutdown_rx_affinity = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        affinity_task.run(shutdown_rx_affinity).await;
        Ok(())
    });

    info!("All background tasks have been spawned.");
    Ok(())
}
