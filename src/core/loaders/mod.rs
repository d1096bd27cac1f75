// src/core/loaders/mod.rs

//! Rebuilds every in-memory catalog map from the replicated metadata tablet
//! on leader election (spec.md §4.3, C4 step 5). Grounded on the teacher's
//! `server/initialization.rs::load_persistence_data` + `core/persistence/
//! aof_loader.rs`: visit durable rows, clear the target map, repopulate.
//!
//! Loaders run in a fixed order — roles, sys_config, tables, tablets,
//! namespaces, user-defined-types, cluster_config, redis_config — because
//! table/tablet linking depends on both having loaded, and nothing else
//! cross-references beyond that.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::entities::{
    NamespaceInfo, NamespaceMetadata, TableInfo, TableMetadata, TabletInfo, TabletMetadata,
    TablegroupInfo, TablegroupMetadata, UdTypeInfo, UdTypeMetadata,
};
use crate::core::entities::cluster_config::ClusterConfigMetadata;
use crate::core::state::CatalogMaps;
use crate::core::state::catalog_maps::RoleRecord;
use crate::core::syscatalog::{EntityType, SysCatalogGateway};

/// Everything a loader pass produces that doesn't live in `CatalogMaps`
/// itself (the singleton cluster config lives on `MasterState` directly).
pub struct LoadResult {
    pub cluster_config: Option<ClusterConfigMetadata>,
}

/// Visits the replicated store and repopulates every `CatalogMaps` field in
/// the spec-mandated order. Intended to be called with the catalog mutex
/// already held by the caller (leader lifecycle step 5) — this function does
/// no locking of its own, it only mutates the `CatalogMaps` it's given.
pub async fn load_all(gateway: &SysCatalogGateway, maps: &mut CatalogMaps) -> anyhow::Result<LoadResult> {
    load_roles(gateway, maps).await?;
    load_sys_config(gateway, maps).await?;
    let tables = load_tables(gateway).await?;
    let tablets = load_tablets(gateway).await?;
    link_tables_and_tablets(maps, tables, tablets);
    load_namespaces(gateway, maps).await?;
    load_udtypes(gateway, maps).await?;
    let cluster_config = load_cluster_config(gateway).await?;
    load_tablegroups(gateway, maps).await?;
    load_redis_config(gateway, maps).await?;
    Ok(LoadResult { cluster_config })
}

async fn load_roles(gateway: &SysCatalogGateway, maps: &mut CatalogMaps) -> anyhow::Result<()> {
    maps.roles.clear();
    for row in gateway.visit(EntityType::Role).await? {
        let rec: RoleRecord = row.decode()?;
        maps.roles.insert(rec.name.clone(), rec);
    }
    info!(count = maps.roles.len(), "loaded roles");
    Ok(())
}

async fn load_sys_config(gateway: &SysCatalogGateway, maps: &mut CatalogMaps) -> anyhow::Result<()> {
    maps.sys_config.clear();
    for row in gateway.visit(EntityType::SysConfig).await? {
        let value: String = row.decode()?;
        maps.sys_config.insert(row.id.clone(), value);
    }
    info!(count = maps.sys_config.len(), "loaded sys_config");
    Ok(())
}

async fn load_tables(gateway: &SysCatalogGateway) -> anyhow::Result<Vec<Arc<TableInfo>>> {
    let mut tables = Vec::new();
    for row in gateway.visit(EntityType::Table).await? {
        let id = row.id.parse()?;
        let metadata: TableMetadata = row.decode()?;
        tables.push(Arc::new(TableInfo::new(id, metadata)));
    }
    info!(count = tables.len(), "loaded tables");
    Ok(tables)
}

async fn load_tablets(gateway: &SysCatalogGateway) -> anyhow::Result<Vec<Arc<TabletInfo>>> {
    let mut tablets = Vec::new();
    for row in gateway.visit(EntityType::Tablet).await? {
        let id = row.id.parse()?;
        let metadata: TabletMetadata = row.decode()?;
        tablets.push(Arc::new(TabletInfo::new(id, metadata, 0)));
    }
    info!(count = tablets.len(), "loaded tablets");
    Ok(tablets)
}

/// Links loaded tablets into their owning table's active-tablet map.
/// Orphaned tablets (owner not in `tables`) are preserved in `tablets_by_id`
/// and cleaned lazily by the deleted-table GC background task, never dropped
/// here (spec.md §4.3).
fn link_tables_and_tablets(
    maps: &mut CatalogMaps,
    tables: Vec<Arc<TableInfo>>,
    tablets: Vec<Arc<TabletInfo>>,
) {
    maps.tables_by_id.clear();
    maps.tables_by_name.clear();
    maps.tablets_by_id.clear();

    for table in &tables {
        maps.tables_by_id.insert(table.id, table.clone());
        let meta = table.metadata().read();
        // PGSQL tables bypass the by-name map (spec.md §4.5); approximated
        // here by namespace lookup once namespaces have loaded is unnecessary
        // since PGSQL tables are identified by their own namespace's db type,
        // checked by callers that have the namespace in hand.
        maps.tables_by_name
            .entry((meta.namespace_id, meta.name.clone()))
            .or_insert(table.id);
    }

    let mut orphans = 0usize;
    for tablet in tablets {
        maps.tablets_by_id.insert(tablet.id, tablet.clone());
        match maps.tables_by_id.get(&tablet.metadata().read().owning_table) {
            Some(table) => table.add_tablet(tablet),
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        warn!(orphans, "preserved orphaned tablets with no owning table");
    }

    maps.bump_table_map_version();
}

async fn load_namespaces(gateway: &SysCatalogGateway, maps: &mut CatalogMaps) -> anyhow::Result<()> {
    maps.namespaces_by_id.clear();
    maps.namespaces_by_name.clear();
    for row in gateway.visit(EntityType::Namespace).await? {
        let id = row.id.parse()?;
        let metadata: NamespaceMetadata = row.decode()?;
        let info = Arc::new(NamespaceInfo::new(id, metadata));
        let meta = info.metadata().read();
        maps.namespaces_by_name
            .insert((meta.database_type, meta.name.clone()), id);
        drop(meta);
        maps.namespaces_by_id.insert(id, info);
    }
    info!(count = maps.namespaces_by_id.len(), "loaded namespaces");
    Ok(())
}

async fn load_udtypes(gateway: &SysCatalogGateway, maps: &mut CatalogMaps) -> anyhow::Result<()> {
    maps.udtypes_by_id.clear();
    maps.udtypes_by_name.clear();
    for row in gateway.visit(EntityType::UdType).await? {
        let id = row.id.parse()?;
        let metadata: UdTypeMetadata = row.decode()?;
        let info = Arc::new(UdTypeInfo::new(id, metadata));
        let meta = info.metadata().read();
        maps.udtypes_by_name
            .insert((meta.namespace_id, meta.name.clone()), id);
        drop(meta);
        maps.udtypes_by_id.insert(id, info);
    }
    info!(count = maps.udtypes_by_id.len(), "loaded user-defined types");
    Ok(())
}

async fn load_cluster_config(gateway: &SysCatalogGateway) -> anyhow::Result<Option<ClusterConfigMetadata>> {
    let rows = gateway.visit(EntityType::ClusterConfig).await?;
    let config = match rows.into_iter().next() {
        Some(row) => Some(row.decode::<ClusterConfigMetadata>()?),
        None => None,
    };
    info!(found = config.is_some(), "loaded cluster config");
    Ok(config)
}

async fn load_tablegroups(gateway: &SysCatalogGateway, maps: &mut CatalogMaps) -> anyhow::Result<()> {
    maps.tablegroups_by_id.clear();
    maps.tablegroup_tablet_ids.clear();
    for row in gateway.visit(EntityType::Tablegroup).await? {
        let id = row.id.parse()?;
        let metadata: TablegroupMetadata = row.decode()?;
        let parent = metadata.parent_tablet_id;
        maps.tablegroup_tablet_ids.insert(id, parent);
        maps.tablegroups_by_id
            .insert(id, Arc::new(TablegroupInfo::new(id, metadata)));
    }
    info!(count = maps.tablegroups_by_id.len(), "loaded tablegroups");
    Ok(())
}

async fn load_redis_config(gateway: &SysCatalogGateway, maps: &mut CatalogMaps) -> anyhow::Result<()> {
    maps.redis_config.clear();
    for row in gateway.visit(EntityType::RedisConfig).await? {
        let value: String = row.decode()?;
        maps.redis_config.insert(row.id.clone(), value);
    }
    info!(count = maps.redis_config.len(), "loaded redis config");
    Ok(())
}
