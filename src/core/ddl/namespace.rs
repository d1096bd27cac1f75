// src/core/ddl/namespace.rs

use std::sync::Arc;

use tracing::info;

use crate::core::entities::types::{DatabaseType, NamespaceState};
use crate::core::entities::{NamespaceInfo, NamespaceMetadata};
use crate::core::errors::CatalogError;
use crate::core::ids::NamespaceId;
use crate::core::metrics;
use crate::core::state::MasterState;
use crate::core::syscatalog::{EntityRow, EntityType};

pub struct CreateNamespaceRequest {
    pub name: String,
    pub database_type: DatabaseType,
    pub colocated: bool,
    pub source_namespace_id: Option<NamespaceId>,
}

/// `CreateNamespace` (spec.md §4.5). Colocated-database parent-table/tablet
/// creation is handled by `core::ddl::table` once this namespace is RUNNING,
/// not here — this op only owns the namespace row itself.
pub async fn create_namespace(
    state: &Arc<MasterState>,
    req: CreateNamespaceRequest,
) -> Result<NamespaceId, CatalogError> {
    state.require_leader_ready()?;

    if req.name.trim().is_empty() {
        return Err(CatalogError::InvalidArgument("namespace name cannot be empty".into()));
    }

    let id = NamespaceId::generate();
    {
        let maps = state.catalog.lock();
        if maps
            .namespaces_by_name
            .contains_key(&(req.database_type, req.name.clone()))
        {
            metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_namespace", "error"]).inc();
            return Err(CatalogError::AlreadyPresent {
                name: req.name.clone(),
                existing_id: maps.namespaces_by_name[&(req.database_type, req.name.clone())].to_string(),
            });
        }
    }

    let next_pg_oid = if let Some(source) = req.source_namespace_id {
        let maps = state.catalog.lock();
        let source_info = maps
            .namespaces_by_id
            .get(&source)
            .ok_or_else(|| CatalogError::NotFound(format!("source namespace {source}")))?;
        source_info.metadata().read().next_pg_oid
    } else {
        16384
    };

    let metadata = NamespaceMetadata {
        name: req.name.clone(),
        database_type: req.database_type,
        state: NamespaceState::Preparing,
        colocated: req.colocated,
        next_pg_oid,
        pending_transaction_id: None,
    };
    let info = Arc::new(NamespaceInfo::new(id, metadata.clone()));

    let term = state.current_term();
    let row = EntityRow::new(EntityType::Namespace, id.to_string(), &metadata)
        .map_err(|e| CatalogError::Internal(e.to_string()))?;
    state.gateway.upsert(term, state.current_term(), vec![row]).await?;

    {
        let mut maps = state.catalog.lock();
        maps.namespaces_by_name.insert((req.database_type, req.name.clone()), id);
        maps.namespaces_by_id.insert(id, info.clone());
    }

    // §4.5: "commit to RUNNING after all async work (or FAILED on error)".
    // pg_catalog cloning for a PGSQL CREATE DATABASE ... TEMPLATE is out of
    // scope for in-process copy-free bootstrapping; this namespace has no
    // further async work, so it's promoted immediately.
    {
        let mut guard = info.metadata().start_mutation().await;
        guard.dirty.state = NamespaceState::Running;
        let row = EntityRow::new(EntityType::Namespace, id.to_string(), &guard.dirty)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        state.gateway.upsert(term, state.current_term(), vec![row]).await?;
        guard.commit();
    }

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_namespace", "ok"]).inc();
    info!(%id, name = %req.name, "created namespace");
    Ok(id)
}

pub async fn alter_namespace(
    state: &Arc<MasterState>,
    id: NamespaceId,
    new_name: Option<String>,
) -> Result<(), CatalogError> {
    state.require_leader_ready()?;

    let info = {
        let maps = state.catalog.lock();
        maps.namespaces_by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("namespace {id}")))?
    };

    {
        let meta = info.metadata().read();
        if meta.state != NamespaceState::Running {
            return Err(CatalogError::IllegalState(format!(
                "namespace {id} is not RUNNING (state={:?})",
                meta.state
            )));
        }
    }

    let mut guard = info.metadata().start_mutation().await;
    let old_name = guard.dirty.name.clone();
    let db_type = guard.dirty.database_type;

    if let Some(name) = new_name.clone() {
        let mut maps = state.catalog.lock();
        if name != old_name && maps.namespaces_by_name.contains_key(&(db_type, name.clone())) {
            return Err(CatalogError::AlreadyPresent {
                name,
                existing_id: id.to_string(),
            });
        }
        maps.namespaces_by_name.remove(&(db_type, old_name));
        maps.namespaces_by_name.insert((db_type, name.clone()), id);
        guard.dirty.name = name;
    }

    let row = EntityRow::new(EntityType::Namespace, id.to_string(), &guard.dirty)
        .map_err(|e| CatalogError::Internal(e.to_string()))?;
    let term = state.current_term();
    state.gateway.upsert(term, state.current_term(), vec![row]).await?;
    guard.commit();

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["alter_namespace", "ok"]).inc();
    Ok(())
}

pub async fn delete_namespace(state: &Arc<MasterState>, id: NamespaceId) -> Result<(), CatalogError> {
    state.require_leader_ready()?;

    let info = {
        let maps = state.catalog.lock();
        maps.namespaces_by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("namespace {id}")))?
    };

    {
        let meta = info.metadata().read();
        if !matches!(meta.state, NamespaceState::Running | NamespaceState::Failed) {
            return Err(CatalogError::IllegalState(format!(
                "namespace {id} must be RUNNING or FAILED to delete (state={:?})",
                meta.state
            )));
        }
    }

    {
        let maps = state.catalog.lock();
        let has_tables = maps
            .tables_by_id
            .values()
            .any(|t| t.metadata().read().namespace_id == id);
        let has_udtypes = maps
            .udtypes_by_id
            .values()
            .any(|u| u.metadata().read().namespace_id == id);
        if has_tables || has_udtypes {
            return Err(CatalogError::NamespaceNotEmpty(id.to_string()));
        }
    }

    // YSQL's two-phase DELETING -> DELETED path collapses to one step here
    // since child tables were already verified absent above; a deployment
    // with async per-table teardown would instead flip DELETING and let the
    // deleted-table background sweep finish the transition.
    let mut guard = info.metadata().start_mutation().await;
    guard.dirty.state = NamespaceState::Deleting;
    let term = state.current_term();
    state
        .gateway
        .delete(term, state.current_term(), EntityType::Namespace, &id.to_string())
        .await?;
    guard.commit();

    {
        let mut maps = state.catalog.lock();
        let meta = info.metadata().read();
        maps.namespaces_by_name.remove(&(meta.database_type, meta.name.clone()));
        drop(meta);
        maps.namespaces_by_id.remove(&id);
    }

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["delete_namespace", "ok"]).inc();
    info!(%id, "deleted namespace");
    Ok(())
}

/// `ReservePgsqlOids` (spec.md §4.5): atomically bump `next_pg_oid` by
/// `count`, clamped at `u32::MAX`, returning the reserved `[begin, end)`.
pub async fn reserve_pgsql_oids(
    state: &Arc<MasterState>,
    id: NamespaceId,
    count: u32,
) -> Result<(u32, u32), CatalogError> {
    state.require_leader_ready()?;

    let info = {
        let maps = state.catalog.lock();
        maps.namespaces_by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("namespace {id}")))?
    };

    let mut guard = info.metadata().start_mutation().await;
    let (begin, end) = NamespaceInfo::reserve_pg_oids(guard.dirty.next_pg_oid, count);
    guard.dirty.next_pg_oid = end;

    let row = EntityRow::new(EntityType::Namespace, id.to_string(), &guard.dirty)
        .map_err(|e| CatalogError::Internal(e.to_string()))?;
    let term = state.current_term();
    state.gateway.upsert(term, state.current_term(), vec![row]).await?;
    guard.commit();

    Ok((begin, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::FakeTserverProxy;

    async fn leader_ready_state() -> Arc<MasterState> {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
        state.set_current_term(1);
        state.set_leader_ready_term(1);
        state
    }

    #[tokio::test]
    async fn create_namespace_reaches_running() {
        let state = leader_ready_state().await;
        let id = create_namespace(
            &state,
            CreateNamespaceRequest {
                name: "app".into(),
                database_type: DatabaseType::Cql,
                colocated: false,
                source_namespace_id: None,
            },
        )
        .await
        .unwrap();

        let maps = state.catalog.lock();
        let info = maps.namespaces_by_id.get(&id).unwrap();
        assert_eq!(info.metadata().read().state, NamespaceState::Running);
    }

    #[tokio::test]
    async fn create_namespace_rejects_duplicate_name() {
        let state = leader_ready_state().await;
        let req = || CreateNamespaceRequest {
            name: "app".into(),
            database_type: DatabaseType::Cql,
            colocated: false,
            source_namespace_id: None,
        };
        create_namespace(&state, req()).await.unwrap();
        let err = create_namespace(&state, req()).await.unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyPresent { .. }));
    }

    #[tokio::test]
    async fn delete_namespace_rejects_when_not_empty() {
        let state = leader_ready_state().await;
        let ns_id = create_namespace(
            &state,
            CreateNamespaceRequest {
                name: "app".into(),
                database_type: DatabaseType::Cql,
                colocated: false,
                source_namespace_id: None,
            },
        )
        .await
        .unwrap();

        {
            let mut maps = state.catalog.lock();
            let table_id = crate::core::ids::TableId::generate();
            let metadata = crate::core::entities::TableMetadata {
                name: "t".into(),
                namespace_id: ns_id,
                table_type: crate::core::entities::types::TableType::UserTable,
                schema: Default::default(),
                partition_schema: crate::core::entities::types::PartitionSchema {
                    kind: crate::core::entities::types::PartitionSchemaKind::Hash,
                    hash_column_ids: vec![],
                },
                replication_info: None,
                tablespace_id: None,
                state: crate::core::entities::types::TableState::Running,
                hide_state: crate::core::entities::types::HideState::Visible,
                version: 0,
                indexes: vec![],
                index_info: None,
                fully_applied_schema: None,
                colocated: false,
                is_pg_shared_table: false,
                partition_list_version: 0,
                wal_retention_secs: 0,
                retain_delete_markers: false,
                tablegroup_id: None,
                pending_transaction_id: None,
                create_table_error: None,
            };
            maps.tables_by_id.insert(table_id, Arc::new(crate::core::entities::TableInfo::new(table_id, metadata)));
        }

        let err = delete_namespace(&state, ns_id).await.unwrap_err();
        assert!(matches!(err, CatalogError::NamespaceNotEmpty(_)));
    }

    #[tokio::test]
    async fn reserve_pgsql_oids_clamps_at_u32_max() {
        let state = leader_ready_state().await;
        let id = create_namespace(
            &state,
            CreateNamespaceRequest {
                name: "pg".into(),
                database_type: DatabaseType::Pgsql,
                colocated: false,
                source_namespace_id: None,
            },
        )
        .await
        .unwrap();

        {
            let maps = state.catalog.lock();
            let info = maps.namespaces_by_id.get(&id).unwrap().clone();
            drop(maps);
            let mut guard = info.metadata().start_mutation().await;
            guard.dirty.next_pg_oid = u32::MAX - 2;
            guard.commit();
        }

        let (begin, end) = reserve_pgsql_oids(&state, id, 10).await.unwrap();
        assert_eq!(begin, u32::MAX - 2);
        assert_eq!(end, u32::MAX);
    }
}
