// src/core/tserver.rs

//! Tserver registry and RPC proxy boundary. The tserver RPC service surface
//! is out of scope (spec.md §1) — consumed here as the opaque `TserverProxy`
//! trait, "typed proxies" per spec.md §6. Registry bookkeeping is grounded on
//! the teacher's `ClusterState` node table (`core/cluster/state.rs`), trimmed
//! to the fields the placement and heartbeat pipelines actually need.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::core::entities::types::CloudInfo;
use crate::core::ids::{TableId, TabletId, TserverId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TserverDescriptor {
    pub id: TserverId,
    pub rpc_addr: String,
    pub cloud_info: CloudInfo,
    pub last_heartbeat_ms: i64,
    pub is_blacklisted: bool,
    pub is_leader_blacklisted: bool,
    /// Replicas created on this tserver since the last placement pass, used
    /// by the power-of-two-choices allocator (spec.md §4.6 step 4).
    pub recent_replica_creations: usize,
}

#[derive(Default)]
pub struct TserverRegistry {
    servers: DashMap<TserverId, TserverDescriptor>,
}

impl TserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, desc: TserverDescriptor) {
        self.servers.insert(desc.id, desc);
    }

    pub fn get(&self, id: &TserverId) -> Option<TserverDescriptor> {
        self.servers.get(id).map(|e| e.clone())
    }

    pub fn live_servers(&self) -> Vec<TserverDescriptor> {
        self.servers.iter().map(|e| e.clone()).collect()
    }

    pub fn record_replica_created(&self, id: &TserverId) {
        if let Some(mut e) = self.servers.get_mut(id) {
            e.recent_replica_creations += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// The typed RPC surface a master holds against each tserver (spec.md §4.8).
/// A production binary implements this over the real tserver RPC client;
/// tests use `FakeTserverProxy`.
#[async_trait::async_trait]
pub trait TserverProxy: Send + Sync + std::fmt::Debug {
    async fn create_replica(&self, tserver: TserverId, tablet: TabletId) -> anyhow::Result<()>;
    async fn delete_replica(
        &self,
        tserver: TserverId,
        tablet: TabletId,
        tombstone: bool,
        opid_index_less_or_equal: Option<i64>,
    ) -> anyhow::Result<()>;
    async fn alter_table(&self, tserver: TserverId, tablet: TabletId, table: TableId, version: u64) -> anyhow::Result<()>;
    async fn add_server(&self, tserver: TserverId, tablet: TabletId, new_peer: TserverId) -> anyhow::Result<()>;
    async fn remove_server(&self, tserver: TserverId, tablet: TabletId, peer: TserverId) -> anyhow::Result<()>;
    async fn try_step_down(&self, tserver: TserverId, tablet: TabletId, new_leader_hint: Option<TserverId>) -> anyhow::Result<()>;
    async fn start_election(&self, tserver: TserverId, tablet: TabletId) -> anyhow::Result<()>;
    async fn split_tablet(&self, tserver: TserverId, tablet: TabletId, children: Vec<TabletId>) -> anyhow::Result<()>;
    async fn get_tablet_split_key(&self, tserver: TserverId, tablet: TabletId) -> anyhow::Result<(Vec<u8>, Vec<u8>)>;
    async fn add_table_to_tablet(&self, tserver: TserverId, tablet: TabletId, table: TableId) -> anyhow::Result<()>;
    async fn remove_table_from_tablet(&self, tserver: TserverId, tablet: TabletId, table: TableId) -> anyhow::Result<()>;
    async fn truncate_tablet(&self, tserver: TserverId, tablet: TabletId) -> anyhow::Result<()>;
    async fn copartition_table(&self, tserver: TserverId, tablet: TabletId, source_table: TableId) -> anyhow::Result<()>;
}

/// An in-process stand-in used by tests and the single-node demo binary: it
/// always succeeds immediately, with no actual network I/O.
#[derive(Debug)]
pub struct FakeTserverProxy;

#[async_trait::async_trait]
impl TserverProxy for FakeTserverProxy {
    async fn create_replica(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete_replica(
        &self,
        _tserver: TserverId,
        _tablet: TabletId,
        _tombstone: bool,
        _opid_index_less_or_equal: Option<i64>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn alter_table(&self, _tserver: TserverId, _tablet: TabletId, _table: TableId, _version: u64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_server(&self, _tserver: TserverId, _tablet: TabletId, _new_peer: TserverId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_server(&self, _tserver: TserverId, _tablet: TabletId, _peer: TserverId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn try_step_down(&self, _tserver: TserverId, _tablet: TabletId, _new_leader_hint: Option<TserverId>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start_election(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn split_tablet(&self, _tserver: TserverId, _tablet: TabletId, _children: Vec<TabletId>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_tablet_split_key(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
        Ok((vec![0x80], vec![0x80]))
    }

    async fn add_table_to_tablet(&self, _tserver: TserverId, _tablet: TabletId, _table: TableId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_table_from_tablet(&self, _tserver: TserverId, _tablet: TabletId, _table: TableId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn truncate_tablet(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn copartition_table(&self, _tserver: TserverId, _tablet: TabletId, _source_table: TableId) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type SharedTserverProxy = Arc<dyn TserverProxy>;
