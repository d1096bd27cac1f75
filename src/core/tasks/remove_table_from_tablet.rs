// src/core/tasks/remove_table_from_tablet.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncRemoveTableFromTablet` (spec.md §4.8): the inverse of
/// `AddTableToTablet` — deregisters a colocated table from a shared tablet.
#[derive(Debug)]
pub struct RemoveTableFromTabletTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    table_to_remove: TableId,
    proxy: SharedTserverProxy,
}

impl RemoveTableFromTabletTask {
    pub fn new(
        owning_table_id: TableId,
        tserver: TserverId,
        tablet: TabletId,
        table_to_remove: TableId,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::RemoveTableFromTablet, owning_table_id),
            tserver,
            tablet,
            table_to_remove,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for RemoveTableFromTabletTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .remove_table_from_tablet(self.tserver, self.tablet, self.table_to_remove)
            .await?;
        Ok(true)
    }
}
