// src/rpc/namespaces.rs

//! `CreateNamespace`, `AlterNamespace`, `DeleteNamespace`, `ListNamespaces`,
//! `GetNamespaceInfo`, `ReservePgsqlOids` (spec.md §6). Thin JSON handlers
//! over `core::ddl::namespace`; every handler's only job is (de)serializing
//! the wire shape and mapping `CatalogError` into the `{status, code}`
//! envelope (`rpc::envelope`).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::core::ddl::namespace;
use crate::core::entities::types::DatabaseType;
use crate::core::ids::NamespaceId;
use crate::core::state::MasterState;
use crate::rpc::envelope::{ApiError, ApiResult};

fn parse_id(raw: &str) -> Result<NamespaceId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(crate::core::errors::CatalogError::InvalidArgument(format!("malformed namespace id '{raw}'"))))
}

#[derive(Debug, Deserialize)]
pub struct CreateNamespaceBody {
    pub name: String,
    pub database_type: DatabaseType,
    #[serde(default)]
    pub colocated: bool,
    #[serde(default)]
    pub source_namespace_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateNamespaceResponse {
    pub namespace_id: String,
}

pub async fn create_namespace(State(state): State<Arc<MasterState>>, Json(body): Json<CreateNamespaceBody>) -> ApiResult<CreateNamespaceResponse> {
    let source_namespace_id = body.source_namespace_id.as_deref().map(parse_id).transpose()?;
    let id = namespace::create_namespace(
        &state,
        namespace::CreateNamespaceRequest {
            name: body.name,
            database_type: body.database_type,
            colocated: body.colocated,
            source_namespace_id,
        },
    )
    .await?;
    Ok(Json(CreateNamespaceResponse { namespace_id: id.to_string() }))
}

#[derive(Debug, Deserialize)]
pub struct AlterNamespaceBody {
    pub new_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmptyResponse {}

pub async fn alter_namespace(
    State(state): State<Arc<MasterState>>,
    Path(id): Path<String>,
    Json(body): Json<AlterNamespaceBody>,
) -> ApiResult<EmptyResponse> {
    let id = parse_id(&id)?;
    namespace::alter_namespace(&state, id, body.new_name).await?;
    Ok(Json(EmptyResponse {}))
}

pub async fn delete_namespace(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<EmptyResponse> {
    let id = parse_id(&id)?;
    namespace::delete_namespace(&state, id).await?;
    Ok(Json(EmptyResponse {}))
}

#[derive(Debug, Serialize)]
pub struct NamespaceSummary {
    pub id: String,
    pub name: String,
    pub database_type: DatabaseType,
    pub state: crate::core::entities::types::NamespaceState,
}

pub async fn list_namespaces(State(state): State<Arc<MasterState>>) -> ApiResult<Vec<NamespaceSummary>> {
    let out: Vec<NamespaceSummary> = state
        .catalog
        .lock()
        .namespaces_by_id
        .iter()
        .map(|(id, info)| {
            let meta = info.metadata().read();
            NamespaceSummary { id: id.to_string(), name: meta.name.clone(), database_type: meta.database_type, state: meta.state }
        })
        .collect();
    Ok(Json(out))
}

pub async fn get_namespace_info(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<NamespaceSummary> {
    let id = parse_id(&id)?;
    let info = state
        .catalog
        .lock()
        .namespaces_by_id
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiError(crate::core::errors::CatalogError::NotFound(format!("namespace {id}"))))?;
    let meta = info.metadata().read();
    Ok(Json(NamespaceSummary { id: id.to_string(), name: meta.name.clone(), database_type: meta.database_type, state: meta.state }))
}

#[derive(Debug, Deserialize)]
pub struct ReserveOidsBody {
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct ReserveOidsResponse {
    pub begin_oid: u32,
    pub end_oid: u32,
}

pub async fn reserve_pgsql_oids(
    State(state): State<Arc<MasterState>>,
    Path(id): Path<String>,
    Json(body): Json<ReserveOidsBody>,
) -> ApiResult<ReserveOidsResponse> {
    let id = parse_id(&id)?;
    let (begin_oid, end_oid) = namespace::reserve_pgsql_oids(&state, id, body.count).await?;
    Ok(Json(ReserveOidsResponse { begin_oid, end_oid }))
}
