// src/core/ddl/udtype.rs

use std::sync::Arc;

use tracing::info;

use crate::core::entities::types::TableState;
use crate::core::entities::{UdTypeInfo, UdTypeMetadata};
use crate::core::errors::CatalogError;
use crate::core::ids::{NamespaceId, UdTypeId};
use crate::core::metrics;
use crate::core::state::MasterState;
use crate::core::syscatalog::{EntityRow, EntityType};

pub struct CreateUdTypeRequest {
    pub name: String,
    pub namespace_id: NamespaceId,
    pub field_names: Vec<String>,
    pub field_types: Vec<String>,
}

/// `CreateUDType` (spec.md §4.5): validates every `udt:<id>` field reference
/// resolves to a live type in the same namespace before persisting.
pub async fn create_udtype(state: &Arc<MasterState>, req: CreateUdTypeRequest) -> Result<UdTypeId, CatalogError> {
    state.require_leader_ready()?;

    if req.field_names.len() != req.field_types.len() {
        return Err(CatalogError::InvalidSchema(
            "field_names and field_types must have equal length".into(),
        ));
    }

    {
        let maps = state.catalog.lock();
        if maps
            .namespaces_by_id
            .get(&req.namespace_id)
            .is_none()
        {
            return Err(CatalogError::NotFound(format!("namespace {}", req.namespace_id)));
        }
        if maps
            .udtypes_by_name
            .contains_key(&(req.namespace_id, req.name.clone()))
        {
            return Err(CatalogError::AlreadyPresent {
                name: req.name.clone(),
                existing_id: maps.udtypes_by_name[&(req.namespace_id, req.name.clone())].to_string(),
            });
        }
        for field_type in &req.field_types {
            if let Some(referenced) = field_type.strip_prefix("udt:") {
                let referenced_id: UdTypeId = referenced
                    .parse()
                    .map_err(|_| CatalogError::InvalidArgument(format!("malformed type reference {field_type}")))?;
                if !maps.udtypes_by_id.contains_key(&referenced_id) {
                    return Err(CatalogError::NotFound(format!("referenced type {referenced_id}")));
                }
            }
        }
    }

    let udtype_id = UdTypeId::generate();
    let metadata = UdTypeMetadata {
        name: req.name.clone(),
        namespace_id: req.namespace_id,
        field_names: req.field_names,
        field_types: req.field_types,
    };

    let row = EntityRow::new(EntityType::UdType, udtype_id.to_string(), &metadata)
        .map_err(|e| CatalogError::Internal(e.to_string()))?;
    let term = state.current_term();
    if let Err(e) = state.gateway.upsert(term, term, vec![row]).await {
        metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_udtype", "error"]).inc();
        return Err(e);
    }

    {
        let mut maps = state.catalog.lock();
        maps.udtypes_by_name.insert((req.namespace_id, req.name.clone()), udtype_id);
        maps.udtypes_by_id.insert(udtype_id, Arc::new(UdTypeInfo::new(udtype_id, metadata)));
    }

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["create_udtype", "ok"]).inc();
    info!(%udtype_id, name = %req.name, "created user-defined type");
    Ok(udtype_id)
}

/// `DeleteUDType` (spec.md §4.5): rejected while any non-deleted table column
/// uses this type, or any other user-defined type embeds it.
pub async fn delete_udtype(state: &Arc<MasterState>, udtype_id: UdTypeId) -> Result<(), CatalogError> {
    state.require_leader_ready()?;

    let (namespace_id, name) = {
        let maps = state.catalog.lock();
        let info = maps
            .udtypes_by_id
            .get(&udtype_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("user-defined type {udtype_id}")))?;

        for table in maps.tables_by_id.values() {
            let meta = table.metadata().read();
            if meta.state == TableState::Deleted {
                continue;
            }
            let needle = format!("udt:{udtype_id}");
            if meta.schema.columns.iter().any(|c| c.data_type == needle) {
                return Err(CatalogError::IllegalState(format!(
                    "type {udtype_id} is referenced by a column of table {}",
                    table.id
                )));
            }
        }
        for other in maps.udtypes_by_id.values() {
            if other.id != udtype_id && other.metadata().read().references(udtype_id) {
                return Err(CatalogError::IllegalState(format!(
                    "type {udtype_id} is referenced by type {}",
                    other.id
                )));
            }
        }

        let meta = info.metadata().read();
        (meta.namespace_id, meta.name.clone())
    };

    state
        .gateway
        .delete(state.current_term(), state.current_term(), EntityType::UdType, &udtype_id.to_string())
        .await?;

    {
        let mut maps = state.catalog.lock();
        maps.udtypes_by_id.remove(&udtype_id);
        maps.udtypes_by_name.remove(&(namespace_id, name));
    }

    metrics::DDL_OPERATIONS_TOTAL.with_label_values(&["delete_udtype", "ok"]).inc();
    info!(%udtype_id, "deleted user-defined type");
    Ok(())
}

/// `GetUDTypeInfo` (spec.md §6): read-only lookup.
pub fn get_udtype_info(state: &Arc<MasterState>, udtype_id: UdTypeId) -> Option<UdTypeMetadata> {
    let maps = state.catalog.lock();
    maps.udtypes_by_id
        .get(&udtype_id)
        .map(|info| (*info.metadata().read()).clone())
}

/// `ListUDTypes` (spec.md §6), optionally scoped to one namespace.
pub fn list_udtypes(state: &Arc<MasterState>, namespace_id: Option<NamespaceId>) -> Vec<(UdTypeId, UdTypeMetadata)> {
    let maps = state.catalog.lock();
    maps.udtypes_by_id
        .iter()
        .map(|(id, info)| (*id, (*info.metadata().read()).clone()))
        .filter(|(_, meta)| namespace_id.map(|ns| ns == meta.namespace_id).unwrap_or(true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ddl::namespace::{CreateNamespaceRequest, create_namespace};
    use crate::core::entities::types::DatabaseType;
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
    async fn create_udtype_rejects_unresolvable_reference() {
        let state = leader_ready_state().await;
        let ns_id = new_namespace(&state).await;
        let err = create_udtype(
            &state,
            CreateUdTypeRequest {
                name: "addr".into(),
                namespace_id: ns_id,
                field_names: vec!["zip".into()],
                field_types: vec![format!("udt:{}", UdTypeId::generate())],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_udtype_allows_nested_reference() {
        let state = leader_ready_state().await;
        let ns_id = new_namespace(&state).await;
        let inner = create_udtype(
            &state,
            CreateUdTypeRequest {
                name: "zip".into(),
                namespace_id: ns_id,
                field_names: vec!["code".into()],
                field_types: vec!["text".into()],
            },
        )
        .await
        .unwrap();

        let outer = create_udtype(
            &state,
            CreateUdTypeRequest {
                name: "addr".into(),
                namespace_id: ns_id,
                field_names: vec!["zip".into()],
                field_types: vec![format!("udt:{inner}")],
            },
        )
        .await
        .unwrap();

        assert!(get_udtype_info(&state, outer).is_some());
    }

    #[tokio::test]
    async fn delete_udtype_rejects_while_referenced_by_another_type() {
        let state = leader_ready_state().await;
        let ns_id = new_namespace(&state).await;
        let inner = create_udtype(
            &state,
            CreateUdTypeRequest {
                name: "zip".into(),
                namespace_id: ns_id,
                field_names: vec!["code".into()],
                field_types: vec!["text".into()],
            },
        )
        .await
        .unwrap();
        create_udtype(
            &state,
            CreateUdTypeRequest {
                name: "addr".into(),
                namespace_id: ns_id,
                field_names: vec!["zip".into()],
                field_types: vec![format!("udt:{inner}")],
            },
        )
        .await
        .unwrap();

        let err = delete_udtype(&state, inner).await.unwrap_err();
        assert!(matches!(err, CatalogError::IllegalState(_)));
    }

    #[tokio::test]
    async fn delete_udtype_succeeds_once_unreferenced() {
        let state = leader_ready_state().await;
        let ns_id = new_namespace(&state).await;
        let id = create_udtype(
            &state,
            CreateUdTypeRequest {
                name: "zip".into(),
                namespace_id: ns_id,
                field_names: vec!["code".into()],
                field_types: vec!["text".into()],
            },
        )
        .await
        .unwrap();

        delete_udtype(&state, id).await.unwrap();
        assert!(get_udtype_info(&state, id).is_none());
    }
}
