// src/core/tasks/alter_table.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncAlterTable` (spec.md §4.8): pushes the new schema version to one
/// replica of `tablet`. Optionally carries a DDL transaction id, for online
/// schema changes verified via transaction status rather than a fixed term.
#[derive(Debug)]
pub struct AlterTableTask {
    state: TaskState,
    tserver: TserverId,
    tablet: TabletId,
    version: u64,
    #[allow(dead_code)]
    ddl_transaction_id: Option<uuid::Uuid>,
    proxy: SharedTserverProxy,
}

impl AlterTableTask {
    pub fn new(
        table_id: TableId,
        tserver: TserverId,
        tablet: TabletId,
        version: u64,
        ddl_transaction_id: Option<uuid::Uuid>,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::AlterTable, table_id),
            tserver,
            tablet,
            version,
            ddl_transaction_id,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for AlterTableTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .alter_table(self.tserver, self.tablet, self.state.table_id, self.version)
            .await?;
        Ok(true)
    }
}
