// src/core/background/deleted_table_gc.rs

//! Deleted-table sweep (spec.md §4.10): periodically scans every table for
//! the DELETING→DELETED and HIDING→HIDDEN transitions `CheckTableDeleted`
//! performs one table at a time, bulk-applying whatever's ready instead of
//! waiting for each table's own task callbacks to trigger it individually.
//! Grounded on the teacher's interval-driven maintenance loops (e.g.
//! `core/storage/ttl.rs`'s `TtlManager::run`): a `tokio::select!` over an
//! interval tick and a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::core::ddl::table::maybe_transition_table_to_deleted;
use crate::core::state::MasterState;

pub struct DeletedTableGcTask {
    state: Arc<MasterState>,
}

impl DeletedTableGcTask {
    pub fn new(state: Arc<MasterState>) -> Self {
        Self { state }
    }

    async fn sweep_once(&self) {
        let tables: Vec<_> = self.state.catalog.lock().tables_by_id.values().cloned().collect();
        let mut transitioned = 0u32;
        for table in tables {
            if maybe_transition_table_to_deleted(&table).await {
                transitioned += 1;
            }
        }
        if transitioned > 0 {
            info!(transitioned, "deleted-table sweep transitioned tables");
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval_ms = self.state.config.read().await.deleted_table_gc_interval_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.state.is_leader_ready() {
                        continue;
                    }
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}
