// src/core/ddl/table.rs

use std::sync::Arc;

use tracing::info;

use crate::core::entities::types::{
    ColumnSchema, HideState, IndexInfo, IndexPermission, PartitionKeyRange, PartitionSchema,
    PartitionSchemaKind, ReplicationInfo, Schema, TableState, TableType,
};
use crate::core::entities::{TableInfo, TableMetadata, TabletInfo, TabletMetadata};
use crate::core::errors::CatalogError;
use crate::core::ids::{NamespaceId, TableId, TabletId, TablegroupId};
use crate::core::metrics;
use crate::core::state::MasterState;
use crate::core::syscatalog::{EntityRow, EntityType};

pub struct CreateTableRequest {
    pub name: String,
    pub namespace_id: NamespaceId,
    pub table_type: TableType,
    pub schema: Schema,
    /// `None` for a plain hash-partitioned table.
    pub num_tablets: Option<usize>,
    pub replication_info: Option<ReplicationInfo>,
    pub colocated: bool,
    pub tablegroup_id: Option<TablegroupId>,
    /// Present when this table is an index on `table_id`.
    pub index_of: Option<TableId>,
}

fn derive_partition_schema(req: &CreateTableRequest) -> PartitionSchema {
    if req.colocated || req.tablegroup_id.is_some() {
        return PartitionSchema {
            kind: PartitionSchemaKind::Single,
            hash_column_ids: Vec::new(),
        };
    }
    let hash_ids: Vec<u32> = req
        .schema
        .columns
        .iter()
        .filter(|c| c.is_hash_key)
        .map(|c| c.id)
        .collect();
    if hash_ids.is_empty() {
        PartitionSchema {
            kind: PartitionSchemaKind::Range,
            hash_column_ids: Vec::new(),
        }
    } else {
        PartitionSchema {
            kind: PartitionSchemaKind::Hash,
            hash_column_ids: hash_ids,
        }
    }
}

fn validate_schema(schema: &Schema, colocated: bool) -> Result<(), CatalogError> {
    if schema.key_columns().next().is_none() {
        return Err(CatalogError::InvalidSchema("table must have at least one key column".into()));
    }
    if colocated && schema.has_hash_key() {
        return Err(CatalogError::InvalidSchema("colocated tables may not declare a hash key".into()));
    }
    Ok(())
}

async fn resolve_num_tablets(state: &Arc<MasterState>, req: &CreateTableRequest) -> usize {
    if let Some(n) = req.num_tablets {
        return n.max(1);
    }
    let cfg = state.config.read().await;
    let live = state.tservers.len().max(1);
    (live * cfg.default_shards_per_tserver).max(cfg.default_num_tablets_per_table)
}

fn split_range_into(n: usize) -> Vec<PartitionKeyRange> {
    if n <= 1 {
        return vec![PartitionKeyRange::full_range()];
    }
    let mut ranges = Vec::with_capacity(n);
    let step = (u16::MAX as u32 + 1) / n as u32;
    let mut prev: Option<Vec<u8>> = None;
    for i in 0..n {
        let start = prev.clone().unwrap_or_default();
        let end = if i + 1 == n {
            None
        } else {
            let boundary = ((i as u32 + 1) * step) as u16;
            Some(boundary.to_be_bytes().to_vec())
        };
        ranges.push(PartitionKeyRange {
            start,
            end: end.clone(),
        });
        prev = end;
    }
    ranges
}

/// `CreateTable` (spec.md §4.5 steps 1-9). Index-specific follow-up (step 10)
/// and pending-transaction verification (step 11) are handled by callers
/// that have that context; this function owns table+tablet creation only.
pub async fn create_table(
    state: &Arc<MasterState>,
    req: CreateTableRequest,
) -> Result<TableId, CatalogError> {
    state.require_leader_ready()?;

    let namespace = {
        let maps = state.catalog.lock();
        maps.namespaces_by_id
            .get(&req.namespace_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("namespace {}", req.namespace_id)))?
    };
    let (db_type, ns_colocated) = {
        let meta = namespace.metadata().read();
        (meta.database_type, meta.colocated)
    };

    if let Some(indexed_id) = req.index_of {
        let maps = state.catalog.lock();
        let indexed = maps
            .tables_by_id
            .get(&indexed_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("indexed table {indexed_id}")))?;
        if indexed.metadata().read().state != TableState::Running {
            return Err(CatalogError::IllegalState(format!(
                "indexed table {indexed_id} is not RUNNING"
            )));
        }
    }

    validate_schema(&req.schema, req.colocated || ns_colocated)?;
    let partition_schema = derive_partition_schema(&req);
    let replication_info = req.replication_info.clone();
    let num_tablets = if matches!(partition_schema.kind, PartitionSchemaKind::Single) {
        1
    } else {
        resolve_num_tablets(state, &req).await
    };

    let is_pg_shared_table = db_type == crate::core::entities::types::DatabaseType::Pgsql && req.table_type == TableType::SystemTable;
    let table_id = TableId::generate();

    // Reserve the name under the same critical section as the collision
    // check (spec.md §4.5 step 7) so two concurrent `create_table` calls for
    // the same name can't both pass the check before either inserts.
    {
        let mut maps = state.catalog.lock();
        if !is_pg_shared_table {
            if let Some(existing_id) = maps.tables_by_name.get(&(req.namespace_id, req.name.clone())) {
                metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_table", "error"]).inc();
                return Err(CatalogError::AlreadyPresent {
                    name: req.name.clone(),
                    existing_id: existing_id.to_string(),
                });
            }
            maps.tables_by_name.insert((req.namespace_id, req.name.clone()), table_id);
        }
    }
    let metadata = TableMetadata {
        name: req.name.clone(),
        namespace_id: req.namespace_id,
        table_type: req.table_type,
        schema: req.schema.clone(),
        partition_schema: partition_schema.clone(),
        replication_info,
        tablespace_id: None,
        state: TableState::Preparing,
        hide_state: HideState::Visible,
        version: 0,
        indexes: Vec::new(),
        index_info: req.index_of.map(|t| IndexInfo {
            table_id: t,
            permission: IndexPermission::DeleteOnly,
        }),
        fully_applied_schema: None,
        colocated: req.colocated || ns_colocated,
        is_pg_shared_table,
        partition_list_version: 0,
        wal_retention_secs: 0,
        retain_delete_markers: false,
        tablegroup_id: req.tablegroup_id,
        pending_transaction_id: None,
        create_table_error: None,
    };
    let table = Arc::new(TableInfo::new(table_id, metadata.clone()));

    let parent_tablet = if let Some(tg_id) = req.tablegroup_id {
        let maps = state.catalog.lock();
        maps.tablegroup_tablet_ids.get(&tg_id).copied()
    } else if req.colocated || ns_colocated {
        let maps = state.catalog.lock();
        maps.colocated_tablet_ids.get(&req.namespace_id).copied()
    } else {
        None
    };

    let mut rows = vec![
        EntityRow::new(EntityType::Table, table_id.to_string(), &metadata)
            .map_err(|e| CatalogError::Internal(e.to_string()))?,
    ];
    let mut tablets = Vec::new();

    if let Some(parent_id) = parent_tablet {
        let maps = state.catalog.lock();
        if let Some(parent) = maps.tablets_by_id.get(&parent_id).cloned() {
            table.add_tablet(parent);
        }
    } else {
        for range in split_range_into(num_tablets) {
            let tablet_id = TabletId::generate();
            let tablet_metadata = TabletMetadata::new(table_id, range);
            rows.push(
                EntityRow::new(EntityType::Tablet, tablet_id.to_string(), &tablet_metadata)
                    .map_err(|e| CatalogError::Internal(e.to_string()))?,
            );
            let tablet = Arc::new(TabletInfo::new(tablet_id, tablet_metadata, 0));
            tablets.push(tablet);
        }
    }

    let term = state.current_term();
    if let Err(e) = state.gateway.upsert(term, term, rows).await {
        metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_table", "error"]).inc();
        if !is_pg_shared_table {
            let mut maps = state.catalog.lock();
            maps.tables_by_name.remove(&(req.namespace_id, req.name.clone()));
        }
        return Err(e);
    }

    {
        let mut maps = state.catalog.lock();
        maps.tables_by_id.insert(table_id, table.clone());
        for tablet in tablets {
            maps.tablets_by_id.insert(tablet.id, tablet.clone());
            table.add_tablet(tablet);
        }
        maps.bump_table_map_version();
    }

    {
        let mut guard = table.metadata().start_mutation().await;
        guard.dirty.state = TableState::Running;
        let row = EntityRow::new(EntityType::Table, table_id.to_string(), &guard.dirty)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        state.gateway.upsert(term, term, vec![row]).await?;
        guard.commit();
    }

    if let Some(indexed_id) = req.index_of {
        let indexed_table = {
            let maps = state.catalog.lock();
            maps.tables_by_id.get(&indexed_id).cloned()
        };
        if let Some(indexed_table) = indexed_table {
            let mut indexed_guard = indexed_table.metadata().start_mutation().await;
            indexed_guard.dirty.indexes.push(IndexInfo {
                table_id,
                permission: IndexPermission::DeleteOnly,
            });
            indexed_guard.dirty.version += 1;
            let row = EntityRow::new(EntityType::Table, indexed_id.to_string(), &indexed_guard.dirty)
                .map_err(|e| CatalogError::Internal(e.to_string()))?;
            state.gateway.upsert(term, term, vec![row]).await?;
            indexed_guard.commit();
        }
    }

    if let Some(tg_id) = req.tablegroup_id {
        crate::core::ddl::tablegroup::register_member_table(state, tg_id, table_id).await?;
    }

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_table", "ok"]).inc();
    metrics::TABLES_TOTAL.inc();
    info!(%table_id, name = %req.name, "created table");
    Ok(table_id)
}

/// `AlterTable` (spec.md §4.5). Only the additive/renaming column edits are
/// modeled explicitly; `wal_retention_secs`/`replication_info` updates are
/// applied directly since they carry no schema-shape invariant beyond what's
/// validated here.
pub enum AlterTableStep {
    AddColumn(ColumnSchema),
    DropColumn(String),
    RenameColumn { from: String, to: String },
}

pub async fn alter_table(
    state: &Arc<MasterState>,
    table_id: TableId,
    steps: Vec<AlterTableStep>,
    new_wal_retention_secs: Option<u64>,
) -> Result<u64, CatalogError> {
    state.require_leader_ready()?;

    if new_wal_retention_secs.is_some() && !steps.is_empty() {
        return Err(CatalogError::InvalidArgument(
            "wal_retention_secs changes may not be batched with other alter steps".into(),
        ));
    }

    let table = {
        let maps = state.catalog.lock();
        maps.tables_by_id
            .get(&table_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("table {table_id}")))?
    };

    let mut guard = table.metadata().start_mutation().await;
    if guard.dirty.fully_applied_schema.is_none() {
        guard.dirty.fully_applied_schema = Some(guard.dirty.schema.clone());
    }

    let mut ddl_entries = Vec::new();
    for step in steps {
        match step {
            AlterTableStep::AddColumn(col) => {
                guard.dirty.schema.next_column_id = guard.dirty.schema.next_column_id.max(col.id + 1);
                ddl_entries.push(format!("add_column:{}", col.name));
                guard.dirty.schema.columns.push(col);
            }
            AlterTableStep::DropColumn(name) => {
                let is_key = guard
                    .dirty
                    .schema
                    .column(&name)
                    .map(|c| c.is_key)
                    .unwrap_or(false);
                if is_key {
                    return Err(CatalogError::InvalidSchema(format!("cannot drop key column {name}")));
                }
                guard.dirty.schema.columns.retain(|c| c.name != name);
                ddl_entries.push(format!("drop_column:{name}"));
            }
            AlterTableStep::RenameColumn { from, to } => {
                if let Some(col) = guard.dirty.schema.columns.iter_mut().find(|c| c.name == from) {
                    col.name = to.clone();
                }
                ddl_entries.push(format!("rename_column:{from}->{to}"));
            }
        }
    }

    if let Some(secs) = new_wal_retention_secs {
        guard.dirty.wal_retention_secs = secs;
    }

    guard.dirty.version += 1;
    guard.dirty.state = TableState::Altering;
    let new_version = guard.dirty.version;

    let term = state.current_term();
    let row = EntityRow::new(EntityType::Table, table_id.to_string(), &guard.dirty)
        .map_err(|e| CatalogError::Internal(e.to_string()))?;
    state.gateway.upsert(term, term, vec![row]).await?;

    for entry in ddl_entries {
        let _ = state
            .gateway
            .append_ddl_log(crate::core::syscatalog::DdlLogEntry {
                table_id: table_id.to_string(),
                action: "alter_table".to_string(),
                detail: entry,
                timestamp_ms: 0,
            })
            .await;
    }

    guard.commit();

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["alter_table", "ok"]).inc();
    // The actual AsyncAlterTable fan-out to every tablet happens once the
    // caller has the tserver proxy context; see `rpc::tables`.
    Ok(new_version)
}

pub async fn truncate_table(state: &Arc<MasterState>, table_id: TableId) -> Result<(), CatalogError> {
    state.require_leader_ready()?;
    let table = {
        let maps = state.catalog.lock();
        maps.tables_by_id
            .get(&table_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("table {table_id}")))?
    };
    // The AsyncTruncate fan-out itself is dispatched by the RPC layer, which
    // holds the tserver proxy; this just validates state is truncatable.
    if table.metadata().read().state != TableState::Running {
        return Err(CatalogError::IllegalState(format!("table {table_id} is not RUNNING")));
    }
    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["truncate_table", "ok"]).inc();
    Ok(())
}

/// `DeleteTable` (spec.md §4.5). The multi-stage index-removing path
/// (`WRITE_AND_DELETE_WHILE_REMOVING`) is handled by `core::ddl::backfill`;
/// this covers ordinary table/plain-index deletion.
///
/// Step 2 ("recursively descend: collect this table and, if it's a table,
/// its indexes") is implemented by recursing into `delete_table` for each of
/// `indexes[]` once the base table itself has entered DELETING, so every
/// index transitions to DELETING (and eventually DELETED) alongside its
/// base table rather than requiring the caller to sequence them.
pub async fn delete_table(state: &Arc<MasterState>, table_id: TableId) -> Result<(), CatalogError> {
    state.require_leader_ready()?;

    let table = {
        let maps = state.catalog.lock();
        maps.tables_by_id
            .get(&table_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("table {table_id}")))?
    };

    let mut guard = table.metadata().start_mutation().await;
    let index_of = guard.dirty.index_info.clone().map(|i| i.table_id);
    let child_indexes: Vec<TableId> = guard.dirty.indexes.iter().map(|i| i.table_id).collect();
    guard.dirty.state = TableState::Deleting;

    let term = state.current_term();
    let row = EntityRow::new(EntityType::Table, table_id.to_string(), &guard.dirty)
        .map_err(|e| CatalogError::Internal(e.to_string()))?;
    state.gateway.upsert(term, term, vec![row]).await?;
    state
        .gateway
        .append_ddl_log(crate::core::syscatalog::DdlLogEntry {
            table_id: table_id.to_string(),
            action: "delete_table".to_string(),
            detail: "state=DELETING".to_string(),
            timestamp_ms: 0,
        })
        .await
        .map_err(|e| CatalogError::Internal(e.to_string()))?;
    guard.commit();

    // Unregister this table's own name reservation and bump the map version
    // before recursing into its indexes, so a failure deleting one index
    // doesn't leave this table's cleanup undone.
    {
        let mut maps = state.catalog.lock();
        let is_pgsql = table.metadata().read().is_pg_shared_table;
        if !is_pgsql {
            let name = table.metadata().read().name.clone();
            let ns_id = table.metadata().read().namespace_id;
            maps.tables_by_name.remove(&(ns_id, name));
        }
        maps.bump_table_map_version();
    }

    if let Some(indexed_id) = index_of {
        let maps = state.catalog.lock();
        if let Some(indexed) = maps.tables_by_id.get(&indexed_id).cloned() {
            drop(maps);
            let mut indexed_guard = indexed.metadata().start_mutation().await;
            indexed_guard.dirty.indexes.retain(|i| i.table_id != table_id);
            indexed_guard.dirty.version += 1;
            indexed_guard.commit();
        }
    }

    for index_id in child_indexes {
        Box::pin(delete_table(state, index_id)).await?;
    }

    // §4.5 step 5: AsyncDeleteReplica fan-out to every tablet replica is
    // issued by the RPC layer, which holds the tserver proxy.
    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["delete_table", "ok"]).inc();
    info!(%table_id, "table entering DELETING");
    Ok(())
}

/// `CheckTableDeleted` / background half of `CleanUpDeletedTables` (spec.md
/// §4.5 step 6, §4.10): flips DELETING -> DELETED once every tablet is
/// DELETED, or HIDING -> HIDDEN once every tablet has a hide hybrid-time
/// stamped on it.
pub async fn maybe_transition_table_to_deleted(table: &Arc<TableInfo>) -> bool {
    let (state, hide_state) = {
        let meta = table.metadata().read();
        (meta.state, meta.hide_state)
    };

    if state == TableState::Deleting && !table.has_tasks(None) && table.all_tablets_deleted() {
        let mut guard = table.metadata().start_mutation().await;
        guard.dirty.state = TableState::Deleted;
        guard.commit();
        metrics::TABLES_TOTAL.dec();
        return true;
    }

    if hide_state == HideState::Hiding && !table.has_tasks(None) {
        let all_hidden = table.get_tablets(false).iter().all(|t| t.metadata().read().hide_hybrid_time.is_some());
        if all_hidden {
            let mut guard = table.metadata().start_mutation().await;
            guard.dirty.hide_state = HideState::Hidden;
            guard.commit();
            return true;
        }
    }

    false
}
