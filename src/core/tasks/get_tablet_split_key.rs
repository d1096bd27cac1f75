// src/core/tasks/get_tablet_split_key.rs

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncGetTabletSplitKey` (spec.md §4.8, §4.9): asks `tserver` for the
/// midpoint key of `tablet`, used to seed the two-child split pipeline. The
/// only task variant with a payload result, stashed for the caller to read
/// once the task completes.
#[derive(Debug)]
pub struct GetTabletSplitKeyTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    proxy: SharedTserverProxy,
    result: Mutex<Option<(Vec<u8>, Vec<u8>)>>,
}

impl GetTabletSplitKeyTask {
    pub fn new(table_id: TableId, tserver: TserverId, tablet: TabletId, proxy: SharedTserverProxy) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::GetTabletSplitKey, table_id),
            tserver,
            tablet,
            proxy,
            result: Mutex::new(None),
        })
    }

    /// `(encoded_key, partition_key)`, available once `state().is_done()`.
    pub fn result(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        self.result.lock().clone()
    }
}

#[async_trait::async_trait]
impl Runnable for GetTabletSplitKeyTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        let keys = self.proxy.get_tablet_split_key(self.tserver, self.tablet).await?;
        *self.result.lock() = Some(keys);
        Ok(true)
    }
}
