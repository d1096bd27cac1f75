// src/rpc/tablegroups.rs

//! `CreateTablegroup`, `DeleteTablegroup`, `ListTablegroups` (spec.md §6).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State, Query};
use serde::{Deserialize, Serialize};

use crate::core::ddl::tablegroup;
use crate::core::ids::{NamespaceId, TablegroupId};
use crate::core::state::MasterState;
use crate::rpc::envelope::{ApiError, ApiResult};

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(crate::core::errors::CatalogError::InvalidArgument(format!("malformed {what} id '{raw}'"))))
}

#[derive(Debug, Deserialize)]
pub struct CreateTablegroupBody {
    pub name: String,
    pub namespace_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTablegroupResponse {
    pub tablegroup_id: String,
}

pub async fn create_tablegroup(State(state): State<Arc<MasterState>>, Json(body): Json<CreateTablegroupBody>) -> ApiResult<CreateTablegroupResponse> {
    let namespace_id: NamespaceId = parse_id(&body.namespace_id, "namespace")?;
    let id = tablegroup::create_tablegroup(&state, body.name, namespace_id).await?;
    Ok(Json(CreateTablegroupResponse { tablegroup_id: id.to_string() }))
}

#[derive(Debug, Serialize)]
pub struct EmptyResponse {}

pub async fn delete_tablegroup(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<EmptyResponse> {
    let id: TablegroupId = parse_id(&id, "tablegroup")?;
    tablegroup::delete_tablegroup(&state, id).await?;
    Ok(Json(EmptyResponse {}))
}

#[derive(Debug, Deserialize)]
pub struct ListTablegroupsQuery {
    pub namespace_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TablegroupSummary {
    pub id: String,
    pub namespace_id: String,
    pub child_table_count: usize,
}

pub async fn list_tablegroups(State(state): State<Arc<MasterState>>, Query(q): Query<ListTablegroupsQuery>) -> ApiResult<Vec<TablegroupSummary>> {
    let namespace_id = q.namespace_id.as_deref().map(|s| parse_id::<NamespaceId>(s, "namespace")).transpose()?;
    let out = tablegroup::list_tablegroups(&state, namespace_id)
        .into_iter()
        .map(|(id, meta)| TablegroupSummary {
            id: id.to_string(),
            namespace_id: meta.namespace_id.to_string(),
            child_table_count: meta.child_table_ids.len(),
        })
        .collect();
    Ok(Json(out))
}
