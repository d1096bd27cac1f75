// src/core/entities/types.rs

//! Shared value types referenced by more than one entity (spec.md §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::ids::TserverId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum_macros::Display)]
pub enum DatabaseType {
    Cql,
    Pgsql,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum NamespaceState {
    Preparing,
    Running,
    Failed,
    Deleting,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum TableType {
    UserTable,
    IndexTable,
    SystemTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum TableState {
    Preparing,
    Running,
    Altering,
    Deleting,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum HideState {
    Visible,
    Hiding,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum TabletState {
    Preparing,
    Creating,
    Running,
    Replaced,
    Deleted,
}

/// Per-index permission state machine driving YCQL online index backfill
/// (spec.md §4.5, `LaunchBackfillIndexForTable`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum IndexPermission {
    DeleteOnly,
    WriteAndDelete,
    DoBackfill,
    ReadWriteAndDelete,
    WriteAndDeleteWhileRemoving,
    DeleteOnlyWhileRemoving,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub table_id: crate::core::ids::TableId,
    pub permission: IndexPermission,
}

/// A column in a table's schema, with a server-assigned column id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub id: u32,
    pub name: String,
    pub data_type: String,
    pub is_key: bool,
    pub is_hash_key: bool,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Schema {
    pub columns: Vec<ColumnSchema>,
    pub next_column_id: u32,
}

impl Schema {
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|c| c.is_key)
    }

    pub fn has_hash_key(&self) -> bool {
        self.columns.iter().any(|c| c.is_hash_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionSchemaKind {
    Hash,
    Range,
    /// Colocated tables and tablegroup members share a single partition.
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSchema {
    pub kind: PartitionSchemaKind,
    pub hash_column_ids: Vec<u32>,
}

/// Inclusive-exclusive key-space bounds of one tablet's partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKeyRange {
    pub start: Vec<u8>,
    /// `None` means unbounded (the last tablet in the table).
    pub end: Option<Vec<u8>>,
}

impl PartitionKeyRange {
    pub fn full_range() -> Self {
        Self {
            start: Vec::new(),
            end: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudInfo {
    pub cloud: String,
    pub region: String,
    pub zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementBlock {
    pub cloud_info: CloudInfo,
    pub min_num_replicas: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementInfo {
    pub num_replicas: usize,
    pub placement_uuid: Option<String>,
    pub placement_blocks: Vec<PlacementBlock>,
}

impl PlacementInfo {
    pub fn simple(num_replicas: usize) -> Self {
        Self {
            num_replicas,
            placement_uuid: None,
            placement_blocks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationInfo {
    pub live_replicas: PlacementInfo,
    pub read_replicas: Vec<PlacementInfo>,
    pub affinitized_leaders: Vec<CloudInfo>,
}

impl ReplicationInfo {
    pub fn simple(num_replicas: usize) -> Self {
        Self {
            live_replicas: PlacementInfo::simple(num_replicas),
            read_replicas: Vec::new(),
            affinitized_leaders: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaRole {
    Leader,
    Follower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberType {
    Voter,
    Observer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaState {
    Starting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveInfo {
    pub wal_dir: String,
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replica {
    pub role: ReplicaRole,
    pub member_type: MemberType,
    pub state: ReplicaState,
    pub fs_data_dir: String,
    pub drive_info: Option<DriveInfo>,
    pub time_updated_ms: i64,
    pub should_disable_lb_move: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RaftConfig {
    pub opid_index: i64,
    pub peers: Vec<TserverId>,
}

impl RaftConfig {
    pub const INVALID_OPID_INDEX: i64 = -1;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusState {
    pub current_term: i64,
    pub config: RaftConfig,
    pub leader_uuid: Option<TserverId>,
}

impl ConsensusState {
    pub fn empty(minimum_term: i64, peers: Vec<TserverId>) -> Self {
        Self {
            current_term: minimum_term,
            config: RaftConfig {
                opid_index: RaftConfig::INVALID_OPID_INDEX,
                peers,
            },
            leader_uuid: None,
        }
    }
}

pub type ReplicaMap = BTreeMap<TserverId, Replica>;
