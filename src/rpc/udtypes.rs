// src/rpc/udtypes.rs

//! `CreateUDType`, `DeleteUDType`, `GetUDTypeInfo`, `ListUDTypes` (spec.md §6).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::core::ddl::udtype;
use crate::core::ids::{NamespaceId, UdTypeId};
use crate::core::state::MasterState;
use crate::rpc::envelope::{ApiError, ApiResult};

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(crate::core::errors::CatalogError::InvalidArgument(format!("malformed {what} id '{raw}'"))))
}

#[derive(Debug, Deserialize)]
pub struct CreateUdTypeBody {
    pub name: String,
    pub namespace_id: String,
    pub field_names: Vec<String>,
    pub field_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUdTypeResponse {
    pub udtype_id: String,
}

pub async fn create_udtype(State(state): State<Arc<MasterState>>, Json(body): Json<CreateUdTypeBody>) -> ApiResult<CreateUdTypeResponse> {
    let namespace_id: NamespaceId = parse_id(&body.namespace_id, "namespace")?;
    let id = udtype::create_udtype(
        &state,
        udtype::CreateUdTypeRequest { name: body.name, namespace_id, field_names: body.field_names, field_types: body.field_types },
    )
    .await?;
    Ok(Json(CreateUdTypeResponse { udtype_id: id.to_string() }))
}

#[derive(Debug, Serialize)]
pub struct EmptyResponse {}

pub async fn delete_udtype(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<EmptyResponse> {
    let id: UdTypeId = parse_id(&id, "udtype")?;
    udtype::delete_udtype(&state, id).await?;
    Ok(Json(EmptyResponse {}))
}

#[derive(Debug, Serialize)]
pub struct UdTypeSummary {
    pub id: String,
    pub name: String,
    pub field_names: Vec<String>,
    pub field_types: Vec<String>,
}

pub async fn get_udtype_info(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<UdTypeSummary> {
    let id: UdTypeId = parse_id(&id, "udtype")?;
    let meta = udtype::get_udtype_info(&state, id).ok_or_else(|| ApiError(crate::core::errors::CatalogError::NotFound(format!("udtype {id}"))))?;
    Ok(Json(UdTypeSummary { id: id.to_string(), name: meta.name, field_names: meta.field_names, field_types: meta.field_types }))
}

#[derive(Debug, Deserialize)]
pub struct ListUdTypesQuery {
    pub namespace_id: Option<String>,
}

pub async fn list_udtypes(State(state): State<Arc<MasterState>>, Query(q): Query<ListUdTypesQuery>) -> ApiResult<Vec<UdTypeSummary>> {
    let namespace_id = q.namespace_id.as_deref().map(|s| parse_id::<NamespaceId>(s, "namespace")).transpose()?;
    let out = udtype::list_udtypes(&state, namespace_id)
        .into_iter()
        .map(|(id, meta)| UdTypeSummary { id: id.to_string(), name: meta.name, field_names: meta.field_names, field_types: meta.field_types })
        .collect();
    Ok(Json(out))
}
