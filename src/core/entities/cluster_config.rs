// src/core/entities/cluster_config.rs

use serde::{Deserialize, Serialize};

use super::metadata_state::MetadataState;
use super::types::{CloudInfo, PlacementInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blacklist {
    pub hosts: Vec<String>,
    pub initial_load: usize,
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            initial_load: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterReplicationInfo {
    pub live_replicas: PlacementInfo,
    pub read_replicas: Vec<PlacementInfo>,
    pub affinitized_leaders: Vec<CloudInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfigMetadata {
    pub version: u64,
    pub cluster_uuid: uuid::Uuid,
    pub replication_info: ClusterReplicationInfo,
    pub server_blacklist: Blacklist,
    pub leader_blacklist: Blacklist,
}

impl ClusterConfigMetadata {
    pub fn default_with(replication_factor: usize) -> Self {
        Self {
            version: 0,
            cluster_uuid: uuid::Uuid::new_v4(),
            replication_info: ClusterReplicationInfo {
                live_replicas: PlacementInfo::simple(replication_factor),
                read_replicas: Vec::new(),
                affinitized_leaders: Vec::new(),
            },
            server_blacklist: Blacklist::default(),
            leader_blacklist: Blacklist::default(),
        }
    }
}

/// `ClusterConfig` (spec.md §3): a process-wide singleton, still modeled as
/// a CoW entity so reads never block on an in-flight `ChangeMasterClusterConfig`.
pub struct ClusterConfigInfo {
    metadata: MetadataState<ClusterConfigMetadata>,
}

impl ClusterConfigInfo {
    pub fn new(metadata: ClusterConfigMetadata) -> Self {
        Self {
            metadata: MetadataState::new(metadata),
        }
    }

    pub fn metadata(&self) -> &MetadataState<ClusterConfigMetadata> {
        &self.metadata
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct YsqlCatalogConfigMetadata {
    pub version: u64,
    pub initdb_done: bool,
    pub initdb_error: Option<String>,
}

pub struct YsqlCatalogConfigInfo {
    metadata: MetadataState<YsqlCatalogConfigMetadata>,
}

impl YsqlCatalogConfigInfo {
    pub fn new(metadata: YsqlCatalogConfigMetadata) -> Self {
        Self {
            metadata: MetadataState::new(metadata),
        }
    }

    pub fn metadata(&self) -> &MetadataState<YsqlCatalogConfigMetadata> {
        &self.metadata
    }
}
