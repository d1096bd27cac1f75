// src/server/initialization.rs

//! Handles the complete master process initialization: building the
//! catalog-manager state and running it through the leader-election
//! sequence before the RPC surface is allowed to open.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, reload};

use super::context::ServerContext;
use crate::config::MasterConfig;
use crate::core::lifecycle;
use crate::core::state::MasterState;
use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
use crate::core::tserver::FakeTserverProxy;

/// Initializes `MasterState` and runs the single-process election sequence
/// (spec.md §4.4) at term 1, since no Raft/consensus library is wired in
/// (out of scope per spec.md §1 — "consumed as an opaque replicated log").
/// A process running this binary is always the sys-catalog leader for its
/// own term.
pub async fn setup(config: MasterConfig, _log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    // The on-disk metadata tablet engine is out of scope (spec.md §1,
    // "consumed as a key/value upsert/delete/visit API"); `InMemorySysCatalogStore`
    // is that API's only implementation in this crate. Likewise the tserver
    // RPC service surface is "consumed via typed proxies" only —
    // `FakeTserverProxy` is the sole `TserverProxy` implementation available.
    let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
    let state = MasterState::new(config, gateway, Arc::new(FakeTserverProxy));

    state.set_current_term(1);
    lifecycle::run_election_sequence(&state, 1)
        .await
        .map_err(|e| anyhow::anyhow!("initial leader election sequence failed: {e}"))?;
    info!("Catalog manager state initialized and leader-ready at term 1.");

    Ok(ServerContext { state, shutdown_tx, background_tasks: JoinSet::new() })
}

fn log_startup_info(config: &MasterConfig) {
    info!(
        rpc_addr = %format!("{}:{}", config.rpc_bind_addr, config.rpc_port),
        metrics_port = config.metrics_port,
        replication_factor = config.default_replication_factor,
        "starting catalog manager"
    );
}
