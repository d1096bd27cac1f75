// src/core/tasks/add_server.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncAddServer` (spec.md §4.8): asks the current raft leader of `tablet`
/// to add `new_peer` to its configuration.
#[derive(Debug)]
pub struct AddServerTask {
    state: TaskState,
    leader_tserver: TserverId,
    tablet: TabletId,
    new_peer: TserverId,
    proxy: SharedTserverProxy,
}

impl AddServerTask {
    pub fn new(
        table_id: TableId,
        leader_tserver: TserverId,
        tablet: TabletId,
        new_peer: TserverId,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::AddServer, table_id),
            leader_tserver,
            tablet,
            new_peer,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for AddServerTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .add_server(self.leader_tserver, self.tablet, self.new_peer)
            .await?;
        Ok(true)
    }
}
