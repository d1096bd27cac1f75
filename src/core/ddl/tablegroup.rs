// src/core/ddl/tablegroup.rs

use std::sync::Arc;

use tracing::info;

use crate::core::ddl::table::{self, CreateTableRequest};
use crate::core::entities::types::{Schema, TableType};
use crate::core::entities::{TablegroupInfo, TablegroupMetadata};
use crate::core::errors::CatalogError;
use crate::core::ids::{NamespaceId, TablegroupId};
use crate::core::metrics;
use crate::core::state::MasterState;

/// `CreateTablegroup` (spec.md §4.5): wraps `CreateTable` of a parent table
/// that carries no columns of its own and exists only to own the tablegroup's
/// single shared tablet — every member table added later points at the same
/// tablet via `tablegroup_id`.
pub async fn create_tablegroup(
    state: &Arc<MasterState>,
    name: String,
    namespace_id: NamespaceId,
) -> Result<TablegroupId, CatalogError> {
    state.require_leader_ready()?;

    let tablegroup_id = TablegroupId::generate();

    let parent_table_id = table::create_table(
        state,
        CreateTableRequest {
            name: format!("tablegroup.parent.{tablegroup_id}"),
            namespace_id,
            table_type: TableType::SystemTable,
            schema: Schema::default(),
            num_tablets: Some(1),
            replication_info: None,
            colocated: true,
            tablegroup_id: None,
            index_of: None,
        },
    )
    .await
    .map_err(|e| {
        metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_tablegroup", "error"]).inc();
        e
    })?;

    let parent_tablet_id = {
        let maps = state.catalog.lock();
        let parent = maps
            .tables_by_id
            .get(&parent_table_id)
            .cloned()
            .ok_or_else(|| CatalogError::Internal("tablegroup parent table vanished after create".into()))?;
        parent
            .get_tablets(false)
            .first()
            .map(|t| t.id)
            .ok_or_else(|| CatalogError::Internal("tablegroup parent table has no tablet".into()))?
    };

    let metadata = TablegroupMetadata {
        namespace_id,
        child_table_ids: Vec::new(),
        parent_tablet_id,
    };
    let info = Arc::new(TablegroupInfo::new(tablegroup_id, metadata));

    {
        let mut maps = state.catalog.lock();
        maps.tablegroups_by_id.insert(tablegroup_id, info);
        maps.tablegroup_tablet_ids.insert(tablegroup_id, parent_tablet_id);
    }

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_tablegroup", "ok"]).inc();
    info!(%tablegroup_id, %name, "created tablegroup");
    Ok(tablegroup_id)
}

/// `DeleteTablegroup` (spec.md §4.5): rejects while any table still declares
/// this `tablegroup_id`, else deletes the owning parent table.
pub async fn delete_tablegroup(state: &Arc<MasterState>, tablegroup_id: TablegroupId) -> Result<(), CatalogError> {
    state.require_leader_ready()?;

    let (tablegroup, parent_table_id) = {
        let maps = state.catalog.lock();
        let tablegroup = maps
            .tablegroups_by_id
            .get(&tablegroup_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("tablegroup {tablegroup_id}")))?;
        let parent_tablet_id = *maps
            .tablegroup_tablet_ids
            .get(&tablegroup_id)
            .ok_or_else(|| CatalogError::Internal(format!("tablegroup {tablegroup_id} has no parent tablet")))?;
        let parent_table_id = maps
            .tablets_by_id
            .get(&parent_tablet_id)
            .map(|t| t.metadata().read().owning_table)
            .ok_or_else(|| CatalogError::Internal(format!("tablegroup {tablegroup_id} parent tablet missing")))?;
        (tablegroup, parent_table_id)
    };

    if !tablegroup.metadata().read().child_table_ids.is_empty() {
        return Err(CatalogError::IllegalState(format!(
            "tablegroup {tablegroup_id} still has member tables"
        )));
    }

    table::delete_table(state, parent_table_id).await?;

    {
        let mut maps = state.catalog.lock();
        maps.tablegroups_by_id.remove(&tablegroup_id);
        maps.tablegroup_tablet_ids.remove(&tablegroup_id);
    }

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["delete_tablegroup", "ok"]).inc();
    info!(%tablegroup_id, "deleted tablegroup");
    Ok(())
}

/// `ListTablegroups` (spec.md §6): a read-only snapshot, optionally scoped to
/// one namespace.
pub fn list_tablegroups(state: &Arc<MasterState>, namespace_id: Option<NamespaceId>) -> Vec<(TablegroupId, TablegroupMetadata)> {
    let maps = state.catalog.lock();
    maps.tablegroups_by_id
        .iter()
        .map(|(id, info)| (*id, (*info.metadata().read()).clone()))
        .filter(|(_, meta)| namespace_id.map(|ns| ns == meta.namespace_id).unwrap_or(true))
        .collect()
}

/// Registers `table_id` as a member of `tablegroup_id`, called by
/// `CreateTable` once the member table has been persisted (spec.md §4.5).
pub async fn register_member_table(
    state: &Arc<MasterState>,
    tablegroup_id: TablegroupId,
    table_id: crate::core::ids::TableId,
) -> Result<(), CatalogError> {
    let tablegroup = {
        let maps = state.catalog.lock();
        maps.tablegroups_by_id
            .get(&tablegroup_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("tablegroup {tablegroup_id}")))?
    };
    let mut guard = tablegroup.metadata().start_mutation().await;
    if !guard.dirty.child_table_ids.contains(&table_id) {
        guard.dirty.child_table_ids.push(table_id);
    }
    guard.commit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ddl::namespace::{CreateNamespaceRequest, create_namespace};
    use crate::core::entities::types::{ColumnSchema, DatabaseType};
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::FakeTserverProxy;

    async fn leader_ready_state() -> Arc<MasterState> {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
        state.set_current_term(1);
        state.set_leader_ready_term(1);
        state
    }

    async fn new_namespace(state: &Arc<MasterState>) -> NamespaceId {
        create_namespace(
            state,
            CreateNamespaceRequest {
                name: "app".into(),
                database_type: DatabaseType::Cql,
                colocated: false,
                source_namespace_id: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_tablegroup_creates_parent_with_one_tablet() {
        let state = leader_ready_state().await;
        let ns_id = new_namespace(&state).await;
        let tg_id = create_tablegroup(&state, "tg1".into(), ns_id).await.unwrap();

        let maps = state.catalog.lock();
        assert!(maps.tablegroups_by_id.contains_key(&tg_id));
        assert!(maps.tablegroup_tablet_ids.contains_key(&tg_id));
    }

    #[tokio::test]
    async fn delete_tablegroup_rejects_while_members_remain() {
        let state = leader_ready_state().await;
        let ns_id = new_namespace(&state).await;
        let tg_id = create_tablegroup(&state, "tg1".into(), ns_id).await.unwrap();

        let member_id = table::create_table(
            &state,
            CreateTableRequest {
                name: "members".into(),
                namespace_id: ns_id,
                table_type: TableType::UserTable,
                schema: Schema {
                    columns: vec![ColumnSchema {
                        id: 0,
                        name: "id".into(),
                        data_type: "int32".into(),
                        is_key: true,
                        is_hash_key: false,
                        is_nullable: false,
                    }],
                    next_column_id: 1,
                },
                num_tablets: None,
                replication_info: None,
                colocated: false,
                tablegroup_id: Some(tg_id),
                index_of: None,
            },
        )
        .await
        .unwrap();

        {
            let maps = state.catalog.lock();
            let tg = maps.tablegroups_by_id.get(&tg_id).unwrap();
            assert!(tg.metadata().read().child_table_ids.contains(&member_id));
        }

        let err = delete_tablegroup(&state, tg_id).await.unwrap_err();
        assert!(matches!(err, CatalogError::IllegalState(_)));
    }

    #[tokio::test]
    async fn delete_tablegroup_succeeds_once_empty() {
        let state = leader_ready_state().await;
        let ns_id = new_namespace(&state).await;
        let tg_id = create_tablegroup(&state, "tg1".into(), ns_id).await.unwrap();

        delete_tablegroup(&state, tg_id).await.unwrap();

        let maps = state.catalog.lock();
        assert!(!maps.tablegroups_by_id.contains_key(&tg_id));
    }
}
