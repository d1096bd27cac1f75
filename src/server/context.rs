// src/server/context.rs

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::core::state::MasterState;

/// Holds all the initialized state required to run the master process's
/// main loop: the catalog state itself, the shutdown broadcast used to stop
/// every background task in lockstep, and the `JoinSet` those tasks are
/// spawned into.
pub struct ServerContext {
    pub state: Arc<MasterState>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
}
