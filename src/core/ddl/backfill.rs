// src/core/ddl/backfill.rs

//! Online index backfill (spec.md §4.5): the `IndexPermission` state machine
//! that lets a secondary index accept writes before its historical backfill
//! scan finishes, so reads never observe a half-populated index. The actual
//! table scan that populates index rows is a tserver-side, per-tablet
//! operation and out of scope here (spec.md §1); this module owns only the
//! permission transitions a master is responsible for driving.

use std::sync::Arc;

use tracing::info;

use crate::core::entities::types::IndexPermission;
use crate::core::errors::CatalogError;
use crate::core::ids::TableId;
use crate::core::metrics;
use crate::core::state::MasterState;
use crate::core::syscatalog::{EntityRow, EntityType};

fn next_permission(current: IndexPermission) -> Option<IndexPermission> {
    match current {
        IndexPermission::DeleteOnly => Some(IndexPermission::WriteAndDelete),
        IndexPermission::WriteAndDelete => Some(IndexPermission::DoBackfill),
        IndexPermission::DoBackfill => Some(IndexPermission::ReadWriteAndDelete),
        IndexPermission::ReadWriteAndDelete => None,
        IndexPermission::WriteAndDeleteWhileRemoving => Some(IndexPermission::DeleteOnlyWhileRemoving),
        IndexPermission::DeleteOnlyWhileRemoving => None,
    }
}

async fn set_index_permission(
    state: &Arc<MasterState>,
    index_table_id: TableId,
    indexed_table_id: TableId,
    new_permission: IndexPermission,
) -> Result<(), CatalogError> {
    let (index_table, indexed_table) = {
        let maps = state.catalog.lock();
        let index_table = maps
            .tables_by_id
            .get(&index_table_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("index table {index_table_id}")))?;
        let indexed_table = maps
            .tables_by_id
            .get(&indexed_table_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("indexed table {indexed_table_id}")))?;
        (index_table, indexed_table)
    };

    let term = state.current_term();

    {
        let mut guard = index_table.metadata().start_mutation().await;
        let info = guard
            .dirty
            .index_info
            .as_mut()
            .ok_or_else(|| CatalogError::IllegalState(format!("table {index_table_id} is not an index")))?;
        info.permission = new_permission;
        guard.dirty.version += 1;
        let row = EntityRow::new(EntityType::Table, index_table_id.to_string(), &guard.dirty)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        state.gateway.upsert(term, term, vec![row]).await?;
        guard.commit();
    }

    {
        let mut guard = indexed_table.metadata().start_mutation().await;
        if let Some(entry) = guard.dirty.indexes.iter_mut().find(|i| i.table_id == index_table_id) {
            entry.permission = new_permission;
        }
        guard.dirty.version += 1;
        let row = EntityRow::new(EntityType::Table, indexed_table_id.to_string(), &guard.dirty)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        state.gateway.upsert(term, term, vec![row]).await?;
        guard.commit();
    }

    Ok(())
}

/// `LaunchBackfillIndexForTable` (YCQL, spec.md §4.5): advances one step of
/// `DELETE_ONLY -> WRITE_AND_DELETE -> DO_BACKFILL -> READ_WRITE_AND_DELETE`.
/// Callers re-invoke this once per completed step until the index reaches
/// `READ_WRITE_AND_DELETE`, mirroring the multi-pass background job the
/// original master runs.
pub async fn launch_backfill_index_for_table(
    state: &Arc<MasterState>,
    index_table_id: TableId,
) -> Result<IndexPermission, CatalogError> {
    state.require_leader_ready()?;

    let (indexed_table_id, current) = {
        let maps = state.catalog.lock();
        let index_table = maps
            .tables_by_id
            .get(&index_table_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("index table {index_table_id}")))?;
        let info = index_table
            .metadata()
            .read()
            .index_info
            .clone()
            .ok_or_else(|| CatalogError::IllegalState(format!("table {index_table_id} is not an index")))?;
        (info.table_id, info.permission)
    };

    let new_permission = next_permission(current)
        .ok_or_else(|| CatalogError::IllegalState(format!("index {index_table_id} has no further permission to advance to")))?;

    set_index_permission(state, index_table_id, indexed_table_id, new_permission).await?;

    metrics::DDL_OPERATIONS_TOTAL
        .with_label_values(&["launch_backfill_index_for_table", "ok"])
        .inc();
    info!(%index_table_id, ?new_permission, "advanced index permission");
    Ok(new_permission)
}

/// `BackfillIndex` (YSQL, spec.md §4.5): requires the index to already be at
/// `WRITE_AND_DELETE`, performs the (out-of-scope) backfill scan, and
/// publishes `READ_WRITE_AND_DELETE` directly — YSQL does not pass through
/// the intermediate `DO_BACKFILL` bookkeeping state that YCQL's multi-pass
/// job uses.
pub async fn backfill_index(state: &Arc<MasterState>, index_table_id: TableId) -> Result<(), CatalogError> {
    state.require_leader_ready()?;

    let (indexed_table_id, current) = {
        let maps = state.catalog.lock();
        let index_table = maps
            .tables_by_id
            .get(&index_table_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("index table {index_table_id}")))?;
        let info = index_table
            .metadata()
            .read()
            .index_info
            .clone()
            .ok_or_else(|| CatalogError::IllegalState(format!("table {index_table_id} is not an index")))?;
        (info.table_id, info.permission)
    };

    if current != IndexPermission::WriteAndDelete {
        return Err(CatalogError::IllegalState(format!(
            "index {index_table_id} must be at WRITE_AND_DELETE to backfill, is {current:?}"
        )));
    }

    set_index_permission(state, index_table_id, indexed_table_id, IndexPermission::ReadWriteAndDelete).await?;

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["backfill_index", "ok"]).inc();
    info!(%index_table_id, "index backfill complete, now READ_WRITE_AND_DELETE");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ddl::namespace::{CreateNamespaceRequest, create_namespace};
    use crate::core::ddl::table::{CreateTableRequest, create_table};
    use crate::core::entities::types::{ColumnSchema, DatabaseType, Schema, TableType};
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::FakeTserverProxy;

    async fn leader_ready_state() -> Arc<MasterState> {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
        state.set_current_term(1);
        state.set_leader_ready_term(1);
        state
    }

    fn key_schema() -> Schema {
        Schema {
            columns: vec![ColumnSchema {
                id: 0,
                name: "id".into(),
                data_type: "int32".into(),
                is_key: true,
                is_hash_key: true,
                is_nullable: false,
            }],
            next_column_id: 1,
        }
    }

    async fn new_index(state: &Arc<MasterState>) -> (TableId, TableId) {
        let ns_id = create_namespace(
            state,
            CreateNamespaceRequest {
                name: "app".into(),
                database_type: DatabaseType::Cql,
                colocated: false,
                source_namespace_id: None,
            },
        )
        .await
        .unwrap();
        let base = create_table(
            state,
            CreateTableRequest {
                name: "users".into(),
                namespace_id: ns_id,
                table_type: TableType::UserTable,
                schema: key_schema(),
                num_tablets: Some(1),
                replication_info: None,
                colocated: false,
                tablegroup_id: None,
                index_of: None,
            },
        )
        .await
        .unwrap();
        let index = create_table(
            state,
            CreateTableRequest {
                name: "users_by_email".into(),
                namespace_id: ns_id,
                table_type: TableType::IndexTable,
                schema: key_schema(),
                num_tablets: Some(1),
                replication_info: None,
                colocated: false,
                tablegroup_id: None,
                index_of: Some(base),
            },
        )
        .await
        .unwrap();
        (base, index)
    }

    #[tokio::test]
    async fn new_index_starts_at_delete_only() {
        let state = leader_ready_state().await;
        let (_base, index) = new_index(&state).await;
        let maps = state.catalog.lock();
        let permission = maps.tables_by_id.get(&index).unwrap().metadata().read().index_info.clone().unwrap().permission;
        assert_eq!(permission, IndexPermission::DeleteOnly);
    }

    #[tokio::test]
    async fn launch_backfill_advances_one_step_at_a_time() {
        let state = leader_ready_state().await;
        let (base, index) = new_index(&state).await;

        let p1 = launch_backfill_index_for_table(&state, index).await.unwrap();
        assert_eq!(p1, IndexPermission::WriteAndDelete);

        let p2 = launch_backfill_index_for_table(&state, index).await.unwrap();
        assert_eq!(p2, IndexPermission::DoBackfill);

        let p3 = launch_backfill_index_for_table(&state, index).await.unwrap();
        assert_eq!(p3, IndexPermission::ReadWriteAndDelete);

        let maps = state.catalog.lock();
        let base_table = maps.tables_by_id.get(&base).unwrap();
        let mirrored = base_table.metadata().read().indexes.iter().find(|i| i.table_id == index).unwrap().permission;
        assert_eq!(mirrored, IndexPermission::ReadWriteAndDelete);
    }

    #[tokio::test]
    async fn backfill_index_requires_write_and_delete() {
        let state = leader_ready_state().await;
        let (_base, index) = new_index(&state).await;

        let err = backfill_index(&state, index).await.unwrap_err();
        assert!(matches!(err, CatalogError::IllegalState(_)));

        launch_backfill_index_for_table(&state, index).await.unwrap();
        backfill_index(&state, index).await.unwrap();

        let maps = state.catalog.lock();
        let permission = maps.tables_by_id.get(&index).unwrap().metadata().read().index_info.clone().unwrap().permission;
        assert_eq!(permission, IndexPermission::ReadWriteAndDelete);
    }
}
