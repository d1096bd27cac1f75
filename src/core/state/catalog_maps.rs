// src/core/state/catalog_maps.rs

//! The identity maps guarded by the "catalog mutex" (spec.md §5): by-id and
//! by-name lookups for every entity kind, plus the small amount of auxiliary
//! indexing (colocated tablets, hidden tablets) the DDL engine needs. Held
//! briefly and never across I/O, mirroring the teacher's `state_lock`
//! discipline (`core/state/core.rs`).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::entities::types::DatabaseType;
use crate::core::entities::{NamespaceInfo, TableInfo, TabletInfo, TablegroupInfo, UdTypeInfo};
use crate::core::ids::{NamespaceId, TableId, TabletId, TablegroupId, UdTypeId};

/// A loaded RBAC role row (spec.md §4.3, §4.4 step 6: "default roles"). The
/// role/permission model itself is out of scope (spec.md §1); this is just
/// enough of a record for loaders and default-role bootstrapping to round-trip.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoleRecord {
    pub name: String,
    pub can_login: bool,
    pub is_superuser: bool,
}

#[derive(Default)]
pub struct CatalogMaps {
    pub roles: BTreeMap<String, RoleRecord>,
    pub sys_config: BTreeMap<String, String>,

    pub namespaces_by_id: BTreeMap<NamespaceId, Arc<NamespaceInfo>>,
    pub namespaces_by_name: BTreeMap<(DatabaseType, String), NamespaceId>,

    pub tables_by_id: BTreeMap<TableId, Arc<TableInfo>>,
    /// Absent for PGSQL tables, which bypass the by-name map (spec.md §4.5).
    pub tables_by_name: BTreeMap<(NamespaceId, String), TableId>,
    /// Bumped whenever `tables_by_name` is modified in bulk, so cached
    /// readers keyed off `tables_by_id` know to re-check (design note §9).
    pub tables_by_id_map_version: u64,

    pub tablets_by_id: BTreeMap<TabletId, Arc<TabletInfo>>,

    pub udtypes_by_id: BTreeMap<UdTypeId, Arc<UdTypeInfo>>,
    pub udtypes_by_name: BTreeMap<(NamespaceId, String), UdTypeId>,

    pub tablegroups_by_id: BTreeMap<TablegroupId, Arc<TablegroupInfo>>,
    pub tablegroup_tablet_ids: BTreeMap<TablegroupId, TabletId>,

    pub colocated_tablet_ids: BTreeMap<NamespaceId, TabletId>,
    pub hidden_tablets: BTreeSet<TabletId>,

    pub redis_config: BTreeMap<String, String>,
}

impl CatalogMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump_table_map_version(&mut self) {
        self.tables_by_id_map_version += 1;
    }
}
