// src/core/tasks/add_table_to_tablet.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncAddTableToTablet` (spec.md §4.8): registers `table` as colocated on
/// `tablet`, hosted at `tserver`.
#[derive(Debug)]
pub struct AddTableToTabletTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    table_to_add: TableId,
    proxy: SharedTserverProxy,
}

impl AddTableToTabletTask {
    pub fn new(
        owning_table_id: TableId,
        tserver: TserverId,
        tablet: TabletId,
        table_to_add: TableId,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::AddTableToTablet, owning_table_id),
            tserver,
            tablet,
            table_to_add,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for AddTableToTabletTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .add_table_to_tablet(self.tserver, self.tablet, self.table_to_add)
            .await?;
        Ok(true)
    }
}
