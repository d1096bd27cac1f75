// src/core/background/partitions_rebuild.rs

//! `system.partitions` rebuild (spec.md §4.10): regenerates the virtual
//! table's payload — one row per active tablet, naming its owning table and
//! partition bounds — on a configurable interval, and publishes the result
//! as a single atomic pointer swap (mirroring `tablespace_refresh`'s swap
//! discipline). The RPC surface that serves this payload to clients is out
//! of scope here (spec.md §1); this only keeps `MasterState::system_partitions`
//! current for whatever later reads it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::core::ids::{TableId, TabletId};
use crate::core::state::MasterState;

#[derive(Debug, Clone)]
pub struct PartitionRow {
    pub table_id: TableId,
    pub tablet_id: TabletId,
    pub partition_start: Vec<u8>,
    pub partition_end: Option<Vec<u8>>,
    pub replica_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SystemPartitionsSnapshot {
    pub rows: Vec<PartitionRow>,
    pub generated_at_term: i64,
}

pub struct PartitionsRebuildTask {
    state: Arc<MasterState>,
}

impl PartitionsRebuildTask {
    pub fn new(state: Arc<MasterState>) -> Self {
        Self { state }
    }

    fn rebuild_once(&self) {
        let tables: Vec<_> = self.state.catalog.lock().tables_by_id.values().cloned().collect();
        let mut rows = Vec::new();
        for table in &tables {
            for tablet in table.get_tablets(false) {
                let meta = tablet.metadata().read();
                rows.push(PartitionRow {
                    table_id: table.id,
                    tablet_id: tablet.id,
                    partition_start: meta.partition.start.clone(),
                    partition_end: meta.partition.end.clone(),
                    replica_count: meta.replica_locations.len(),
                });
            }
        }
        let row_count = rows.len();
        let snapshot = Arc::new(SystemPartitionsSnapshot {
            rows,
            generated_at_term: self.state.current_term(),
        });
        *self.state.system_partitions.write() = snapshot;
        info!(row_count, "rebuilt system.partitions payload");
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval_ms = self.state.config.read().await.partitions_rebuild_interval_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.state.is_leader_ready() {
                        continue;
                    }
                    self.rebuild_once();
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::types::{HideState, PartitionKeyRange, PartitionSchema, PartitionSchemaKind, ReplicationInfo, Schema, TableState, TableType};
    use crate::core::entities::{TableInfo, TableMetadata, TabletInfo, TabletMetadata};
    use crate::core::ids::NamespaceId;
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::FakeTserverProxy;

    #[test]
    fn rebuild_emits_one_row_per_active_tablet() {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));

        let table_id = TableId::generate();
        let meta = TableMetadata {
            name: "orders".into(),
            namespace_id: NamespaceId::generate(),
            table_type: TableType::UserTable,
            schema: Schema { columns: vec![], next_column_id: 0 },
            partition_schema: PartitionSchema { kind: PartitionSchemaKind::Hash, hash_column_ids: vec![] },
            replication_info: Some(ReplicationInfo::simple(1)),
            tablespace_id: None,
            state: TableState::Running,
            hide_state: HideState::Visible,
            version: 0,
            indexes: vec![],
            index_info: None,
            fully_applied_schema: None,
            colocated: false,
            is_pg_shared_table: false,
            partition_list_version: 0,
            wal_retention_secs: 0,
            retain_delete_markers: false,
            tablegroup_id: None,
            pending_transaction_id: None,
            create_table_error: None,
        };
        let table = Arc::new(TableInfo::new(table_id, meta));
        let tablet_meta = TabletMetadata::new(table_id, PartitionKeyRange::full_range());
        let tablet = Arc::new(TabletInfo::new(TabletId::generate(), tablet_meta, 0));
        table.add_tablet(tablet.clone());
        state.catalog.lock().tables_by_id.insert(table_id, table.clone());

        let task = PartitionsRebuildTask::new(state.clone());
        task.rebuild_once();

        let snapshot = state.system_partitions.read().clone();
        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(snapshot.rows[0].tablet_id, tablet.id);
    }
}
