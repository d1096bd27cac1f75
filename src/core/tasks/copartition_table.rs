// src/core/tasks/copartition_table.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncCopartitionTable` (spec.md §4.8): merges a newly-created table into
/// an existing tablegroup's shared tablet, repartitioning it to match
/// `source_table`'s partitioning.
#[derive(Debug)]
pub struct CopartitionTableTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    source_table: TableId,
    proxy: SharedTserverProxy,
}

impl CopartitionTableTask {
    pub fn new(
        table_id: TableId,
        tserver: TserverId,
        tablet: TabletId,
        source_table: TableId,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::CopartitionTable, table_id),
            tserver,
            tablet,
            source_table,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for CopartitionTableTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .copartition_table(self.tserver, self.tablet, self.source_table)
            .await?;
        Ok(true)
    }
}
