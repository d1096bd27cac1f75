// src/core/entities/tablet.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::metadata_state::MetadataState;
use super::types::{ConsensusState, PartitionKeyRange, Replica, ReplicaMap, TabletState};
use crate::core::ids::{TableId, TabletId, TserverId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabletMetadata {
    /// The table this tablet was created for. Colocated tablets additionally
    /// list every colocated table sharing them in `table_ids`.
    pub owning_table: TableId,
    pub table_ids: Vec<TableId>,
    pub partition: PartitionKeyRange,
    pub state: TabletState,
    pub committed_consensus_state: Option<ConsensusState>,
    pub replica_locations: ReplicaMap,
    pub reported_schema_version: std::collections::BTreeMap<TableId, u64>,
    pub split_depth: u32,
    pub split_parent_tablet_id: Option<TabletId>,
    pub split_tablet_ids: Vec<TabletId>,
    pub hide_hybrid_time: Option<i64>,
    pub retained_by_snapshot_schedules: Vec<uuid::Uuid>,
    /// Most recently reported on-disk size, used by the split pipeline's
    /// size-threshold phases (spec.md §4.9). Zero until the first report.
    pub on_disk_size_bytes: u64,
    /// Set once a split's children have both been reported RUNNING by the
    /// tserver, guarding against re-splitting a parent whose data hasn't
    /// fully drained yet (spec.md §4.9, `may_have_orphaned_post_split_data`).
    pub may_have_orphaned_post_split_data: bool,
}

impl TabletMetadata {
    pub fn new(owning_table: TableId, partition: PartitionKeyRange) -> Self {
        Self {
            owning_table,
            table_ids: vec![owning_table],
            partition,
            state: TabletState::Preparing,
            committed_consensus_state: None,
            replica_locations: ReplicaMap::new(),
            reported_schema_version: Default::default(),
            split_depth: 0,
            split_parent_tablet_id: None,
            split_tablet_ids: Vec::new(),
            hide_hybrid_time: None,
            retained_by_snapshot_schedules: Vec::new(),
            on_disk_size_bytes: 0,
            may_have_orphaned_post_split_data: false,
        }
    }
}

/// `TabletInfo` (spec.md §3, §4.1).
pub struct TabletInfo {
    pub id: TabletId,
    metadata: MetadataState<TabletMetadata>,
    /// Guards the one-shot `InitiateElection` call (spec.md §4.6) so at most
    /// one `AsyncStartElection` is ever in flight for this tablet.
    election_initiated: AtomicBool,
    created_at_ms: i64,
}

impl TabletInfo {
    pub fn new(id: TabletId, metadata: TabletMetadata, now_ms: i64) -> Self {
        Self {
            id,
            metadata: MetadataState::new(metadata),
            election_initiated: AtomicBool::new(false),
            created_at_ms: now_ms,
        }
    }

    pub fn metadata(&self) -> &MetadataState<TabletMetadata> {
        &self.metadata
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn get_replica_locations(&self) -> ReplicaMap {
        self.metadata.read().replica_locations.clone()
    }

    pub fn get_leader(&self) -> Option<TserverId> {
        self.metadata.read().committed_consensus_state.as_ref()?.leader_uuid
    }

    pub fn get_leader_replica_drive_info(&self) -> Option<super::types::DriveInfo> {
        let meta = self.metadata.read();
        let leader = meta.committed_consensus_state.as_ref()?.leader_uuid?;
        meta.replica_locations.get(&leader)?.drive_info.clone()
    }

    /// Idempotent, single-shot guard around `AsyncStartElection` dispatch.
    /// Returns `true` the first time it is called for this tablet; `false`
    /// thereafter, until explicitly reset (e.g. on a subsequent split).
    pub fn try_initiate_election(&self) -> bool {
        self.election_initiated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reset_election_guard(&self) {
        self.election_initiated.store(false, Ordering::Release);
    }

    pub fn last_update_time_ms(&self) -> i64 {
        self.metadata
            .read()
            .replica_locations
            .values()
            .map(|r| r.time_updated_ms)
            .max()
            .unwrap_or(self.created_at_ms)
    }
}

/// Applies one reported replica's state into a mutable replica map,
/// preserving replicas that are still STARTING and not stale (spec.md §4.7
/// step 4, replica-map reconciliation).
pub fn upsert_replica(map: &mut ReplicaMap, tserver: TserverId, replica: Replica) {
    map.insert(tserver, replica);
}

pub fn drive_info_update(map: &mut ReplicaMap, tserver: TserverId, drive_info: super::types::DriveInfo) {
    if let Some(r) = map.get_mut(&tserver) {
        r.drive_info = Some(drive_info);
    }
}
