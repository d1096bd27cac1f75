// src/core/tasks/create_replica.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncCreateReplica` (spec.md §4.8): instructs `tserver` to start hosting
/// a replica of `tablet`.
#[derive(Debug)]
pub struct CreateReplicaTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    proxy: SharedTserverProxy,
}

impl CreateReplicaTask {
    pub fn new(table_id: TableId, tserver: TserverId, tablet: TabletId, proxy: SharedTserverProxy) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::CreateReplica, table_id),
            tserver,
            tablet,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for CreateReplicaTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy.create_replica(self.tserver, self.tablet).await?;
        Ok(true)
    }
}
