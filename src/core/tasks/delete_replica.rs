// src/core/tasks/delete_replica.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncDeleteReplica` (spec.md §4.8): tells `tserver` to remove its copy of
/// `tablet`, optionally leaving a tombstone instead of a full delete, and
/// optionally bounded to a specific `opid_index` (used when evicting a peer
/// that might still be needed up to a point).
#[derive(Debug)]
pub struct DeleteReplicaTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    tombstone: bool,
    opid_index_less_or_equal: Option<i64>,
    proxy: SharedTserverProxy,
}

impl DeleteReplicaTask {
    pub fn new(
        table_id: TableId,
        tserver: TserverId,
        tablet: TabletId,
        tombstone: bool,
        opid_index_less_or_equal: Option<i64>,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::DeleteReplica, table_id),
            tserver,
            tablet,
            tombstone,
            opid_index_less_or_equal,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for DeleteReplicaTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .delete_replica(self.tserver, self.tablet, self.tombstone, self.opid_index_less_or_equal)
            .await?;
        Ok(true)
    }
}
