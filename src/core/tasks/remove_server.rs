// src/core/tasks/remove_server.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncRemoveServer` (spec.md §4.8): asks the current raft leader of
/// `tablet` to remove `peer` from its configuration.
#[derive(Debug)]
pub struct RemoveServerTask {
    state: TaskState,
    leader_tserver: TserverId,
    tablet: TabletId,
    peer: TserverId,
    proxy: SharedTserverProxy,
}

impl RemoveServerTask {
    pub fn new(
        table_id: TableId,
        leader_tserver: TserverId,
        tablet: TabletId,
        peer: TserverId,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::RemoveServer, table_id),
            leader_tserver,
            tablet,
            peer,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for RemoveServerTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .remove_server(self.leader_tserver, self.tablet, self.peer)
            .await?;
        Ok(true)
    }
}
