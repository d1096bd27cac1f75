// src/core/tasks/truncate_tablet.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncTruncateTablet` (spec.md §4.5, `TruncateTable`): wipes the contents
/// of `tablet` on `tserver` in place, without deleting the tablet itself.
#[derive(Debug)]
pub struct TruncateTabletTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    proxy: SharedTserverProxy,
}

impl TruncateTabletTask {
    pub fn new(table_id: TableId, tserver: TserverId, tablet: TabletId, proxy: SharedTserverProxy) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::TruncateTablet, table_id),
            tserver,
            tablet,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for TruncateTabletTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy.truncate_tablet(self.tserver, self.tablet).await?;
        Ok(true)
    }
}
