// src/core/entities/table.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};

use super::metadata_state::MetadataState;
use super::tablet::TabletInfo;
use super::types::{
    HideState, IndexInfo, PartitionSchema, ReplicationInfo, Schema, TableState, TableType,
};
use crate::core::ids::{NamespaceId, TableId, TabletId, TablegroupId};
use crate::core::tasks::framework::{TaskHandle, TaskKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub namespace_id: NamespaceId,
    pub table_type: TableType,
    pub schema: Schema,
    pub partition_schema: PartitionSchema,
    pub replication_info: Option<ReplicationInfo>,
    pub tablespace_id: Option<String>,
    pub state: TableState,
    pub hide_state: HideState,
    pub version: u64,
    pub indexes: Vec<IndexInfo>,
    /// Present when this table *is* an index.
    pub index_info: Option<IndexInfo>,
    /// Schema snapshot taken when entering ALTERING, cleared once the table
    /// returns to RUNNING at the new version (invariant 3/6, spec.md §3).
    pub fully_applied_schema: Option<Schema>,
    pub colocated: bool,
    pub is_pg_shared_table: bool,
    pub partition_list_version: u64,
    pub wal_retention_secs: u64,
    pub retain_delete_markers: bool,
    pub tablegroup_id: Option<TablegroupId>,
    pub pending_transaction_id: Option<uuid::Uuid>,
    /// Sticky error surfaced by `IsCreateTableDone` after a failed create
    /// (spec.md §4.5, `SetCreateTableErrorStatus`).
    pub create_table_error: Option<String>,
}

impl TableMetadata {
    pub fn is_index(&self) -> bool {
        self.index_info.is_some()
    }
}

/// `TableInfo` (spec.md §3, §4.1). Owns the ordered set of child tablets and
/// the registry of outstanding async tasks.
pub struct TableInfo {
    pub id: TableId,
    metadata: MetadataState<TableMetadata>,
    /// Active tablets, ordered by partition start key — the set a live query
    /// routes through.
    active_tablets: SyncMutex<BTreeMap<Vec<u8>, Arc<TabletInfo>>>,
    /// Hidden/replaced/deleted tablets kept around for retention/debugging.
    inactive_tablets: SyncMutex<BTreeMap<TabletId, Arc<TabletInfo>>>,
    tasks: SyncMutex<Vec<Arc<dyn TaskHandle>>>,
}

impl TableInfo {
    pub fn new(id: TableId, metadata: TableMetadata) -> Self {
        Self {
            id,
            metadata: MetadataState::new(metadata),
            active_tablets: SyncMutex::new(BTreeMap::new()),
            inactive_tablets: SyncMutex::new(BTreeMap::new()),
            tasks: SyncMutex::new(Vec::new()),
        }
    }

    pub fn metadata(&self) -> &MetadataState<TableMetadata> {
        &self.metadata
    }

    pub fn add_tablet(&self, tablet: Arc<TabletInfo>) {
        let start = tablet.metadata().read().partition.start.clone();
        self.active_tablets.lock().insert(start, tablet);
    }

    /// Moves `old` out of the active set, inserting `replacement` in its
    /// place at the same partition-start key (spec.md §4.6, overdue-creation
    /// replacement).
    pub fn replace_tablet(&self, old: &Arc<TabletInfo>, replacement: Arc<TabletInfo>) {
        let start = old.metadata().read().partition.start.clone();
        let mut active = self.active_tablets.lock();
        active.insert(start, replacement);
        self.inactive_tablets.lock().insert(old.id, old.clone());
    }

    pub fn deactivate_tablet(&self, tablet: &Arc<TabletInfo>) {
        let start = tablet.metadata().read().partition.start.clone();
        let mut active = self.active_tablets.lock();
        if active.get(&start).map(|t| t.id) == Some(tablet.id) {
            active.remove(&start);
        }
        self.inactive_tablets.lock().insert(tablet.id, tablet.clone());
    }

    pub fn get_tablets(&self, include_inactive: bool) -> Vec<Arc<TabletInfo>> {
        let mut tablets: Vec<_> = self.active_tablets.lock().values().cloned().collect();
        if include_inactive {
            tablets.extend(self.inactive_tablets.lock().values().cloned());
        }
        tablets
    }

    pub fn get_tablets_in_range(
        &self,
        key_start: &[u8],
        key_end: Option<&[u8]>,
        max: usize,
    ) -> Vec<Arc<TabletInfo>> {
        let active = self.active_tablets.lock();
        active
            .range(key_start.to_vec()..)
            .filter(|(start, _)| match key_end {
                Some(end) => start.as_slice() < end,
                None => true,
            })
            .take(max)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn num_partitions(&self) -> usize {
        self.active_tablets.lock().len()
    }

    pub fn get_colocated_tablet(&self) -> Option<Arc<TabletInfo>> {
        self.active_tablets.lock().values().next().cloned()
    }

    pub fn add_task(&self, task: Arc<dyn TaskHandle>) {
        self.tasks.lock().push(task);
    }

    pub fn abort_tasks(&self) {
        let tasks = self.tasks.lock();
        for t in tasks.iter() {
            t.cancel();
        }
    }

    pub fn has_tasks(&self, kind: Option<TaskKind>) -> bool {
        let tasks = self.tasks.lock();
        tasks.iter().any(|t| {
            !t.is_done() && kind.map(|k| t.kind() == k).unwrap_or(true)
        })
    }

    /// Clears completed tasks so the registry doesn't grow without bound.
    pub fn reap_finished_tasks(&self) {
        self.tasks.lock().retain(|t| !t.is_done());
    }

    pub fn is_create_in_progress(&self) -> bool {
        self.metadata().read().state == TableState::Preparing
    }

    pub fn is_alter_in_progress(&self, version: u64) -> bool {
        let meta = self.metadata().read();
        meta.state == TableState::Altering && meta.version <= version
    }

    pub fn is_backfilling(&self) -> bool {
        self.metadata()
            .read()
            .indexes
            .iter()
            .any(|i| matches!(i.permission, super::types::IndexPermission::DoBackfill))
    }

    /// Every tablet of this table has reached a terminal state for deletion
    /// (invariant 5, spec.md §3): all DELETED, or — for hide-only retention —
    /// all HIDDEN (tracked on the tablets' parent table's hide_state here,
    /// since tablets themselves don't carry a hide flag beyond DELETED).
    pub fn all_tablets_deleted(&self) -> bool {
        self.get_tablets(true)
            .iter()
            .all(|t| t.metadata().read().state == super::types::TabletState::Deleted)
    }
}

/// The subset of `all_active_ids` a table's indexes reference, used by
/// `DeleteUDType` cross-table reference checks (spec.md §4.5).
pub fn distinct_table_ids(tables: &[Arc<TableInfo>]) -> BTreeSet<TableId> {
    tables.iter().map(|t| t.id).collect()
}
