// src/core/state/core.rs

//! Defines the central `MasterState` struct, holding all shared master-wide
//! state. Modeled on the teacher's `ServerState` (`core/state/core.rs`): one
//! struct, wrapped in an `Arc`, passed to every handler and task.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use parking_lot::Mutex as SyncMutex;
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::RwLock as AsyncRwLock;

use super::catalog_maps::CatalogMaps;
use crate::config::MasterConfig;
use crate::core::background::partitions_rebuild::SystemPartitionsSnapshot;
use crate::core::entities::{ClusterConfigInfo, ClusterConfigMetadata, YsqlCatalogConfigInfo, YsqlCatalogConfigMetadata};
use crate::core::syscatalog::SysCatalogGateway;
use crate::core::tserver::{SharedTserverProxy, TserverRegistry};
use crate::core::ysql::{NullYsqlCatalogReader, SharedYsqlCatalogReader, YsqlTablespaceManager};

/// `{Constructed, Starting, Running, Closing}` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[repr(u8)]
pub enum LifecycleState {
    Constructed = 0,
    Starting = 1,
    Running = 2,
    Closing = 3,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::Constructed,
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            _ => LifecycleState::Closing,
        }
    }
}

/// Sentinel meaning "no term has finished loading metadata yet".
pub const NO_LEADER_READY_TERM: i64 = -1;

/// The central struct holding all shared, master-wide state. Wrapped in an
/// `Arc` and handed to every RPC handler, async task, and background task.
pub struct MasterState {
    /// Runtime configuration; `RwLock` so `ChangeMasterClusterConfig`-style
    /// admin edits don't require restarting background tasks.
    pub config: AsyncRwLock<MasterConfig>,

    /// `state_lock` (spec.md §5): a simple flag guarding lifecycle state and
    /// `leader_ready_term`, never held across I/O. Represented as atomics
    /// rather than a literal spinlock, since the only operations on it are
    /// single-word reads/writes.
    lifecycle_state: AtomicU8,
    current_term: AtomicI64,
    leader_ready_term: AtomicI64,

    /// `leader_lock` (spec.md §5): read mode for normal leader-qualified
    /// operations, write mode only during election/catch-up reload.
    pub leader_lock: AsyncRwLock<()>,

    /// `catalog mutex` (spec.md §5): guards all identity maps. Held briefly,
    /// never across I/O — callers should clone the `Arc<...Info>` they need
    /// and drop the guard before doing anything that awaits.
    pub catalog: SyncMutex<CatalogMaps>,

    pub cluster_config: ClusterConfigInfo,
    pub ysql_catalog_config: YsqlCatalogConfigInfo,

    pub gateway: SysCatalogGateway,
    pub tservers: TserverRegistry,
    pub tserver_proxy: SharedTserverProxy,

    /// `tablespace_mutex` (spec.md §5): guards the `YsqlTablespaceManager`
    /// shared pointer, rebuilt wholesale and swapped in by the tablespace
    /// refresh background task (spec.md §4.10).
    pub tablespace_manager: SyncRwLock<Arc<YsqlTablespaceManager>>,
    pub ysql_catalog_reader: SharedYsqlCatalogReader,

    /// Latest `system.partitions` virtual-table payload, rebuilt on a timer
    /// by the partitions-rebuild background task (spec.md §4.10).
    pub system_partitions: SyncRwLock<Arc<SystemPartitionsSnapshot>>,

    pub node_id: uuid::Uuid,
}

impl MasterState {
    pub fn new(
        config: MasterConfig,
        gateway: SysCatalogGateway,
        tserver_proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: AsyncRwLock::new(config),
            lifecycle_state: AtomicU8::new(LifecycleState::Constructed as u8),
            current_term: AtomicI64::new(0),
            leader_ready_term: AtomicI64::new(NO_LEADER_READY_TERM),
            leader_lock: AsyncRwLock::new(()),
            catalog: SyncMutex::new(CatalogMaps::new()),
            cluster_config: ClusterConfigInfo::new(ClusterConfigMetadata::default_with(3)),
            ysql_catalog_config: YsqlCatalogConfigInfo::new(YsqlCatalogConfigMetadata::default()),
            gateway,
            tservers: TserverRegistry::new(),
            tserver_proxy,
            tablespace_manager: SyncRwLock::new(Arc::new(YsqlTablespaceManager::default())),
            ysql_catalog_reader: Arc::new(NullYsqlCatalogReader),
            system_partitions: SyncRwLock::new(Arc::new(SystemPartitionsSnapshot::default())),
            node_id: uuid::Uuid::new_v4(),
        })
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.lifecycle_state.load(Ordering::Acquire))
    }

    pub fn set_lifecycle_state(&self, state: LifecycleState) {
        self.lifecycle_state.store(state as u8, Ordering::Release);
    }

    pub fn current_term(&self) -> i64 {
        self.current_term.load(Ordering::Acquire)
    }

    pub fn set_current_term(&self, term: i64) {
        self.current_term.store(term, Ordering::Release);
    }

    pub fn leader_ready_term(&self) -> i64 {
        self.leader_ready_term.load(Ordering::Acquire)
    }

    pub fn set_leader_ready_term(&self, term: i64) {
        self.leader_ready_term.store(term, Ordering::Release);
    }

    /// Invariant 7 (spec.md §3): a non-catalog operation may execute only if
    /// the current Raft term equals the term metadata was fully loaded for.
    pub fn is_leader_ready(&self) -> bool {
        let ready = self.leader_ready_term();
        ready != NO_LEADER_READY_TERM && ready == self.current_term()
    }

    pub fn require_leader_ready(&self) -> Result<(), crate::core::errors::CatalogError> {
        if self.is_leader_ready() {
            Ok(())
        } else {
            Err(crate::core::errors::CatalogError::NotLeader)
        }
    }
}
