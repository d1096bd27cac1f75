// src/core/tasks/start_election.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncStartElection` (spec.md §4.8, §4.6 leader-hint election): asks
/// `tserver` to start a raft election for `tablet`. Dispatch is gated by
/// `TabletInfo::try_initiate_election` so at most one is ever in flight.
#[derive(Debug)]
pub struct StartElectionTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    proxy: SharedTserverProxy,
}

impl StartElectionTask {
    pub fn new(table_id: TableId, tserver: TserverId, tablet: TabletId, proxy: SharedTserverProxy) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::StartElection, table_id),
            tserver,
            tablet,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for StartElectionTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy.start_election(self.tserver, self.tablet).await?;
        Ok(true)
    }
}
