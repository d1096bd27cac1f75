// src/rpc/tablets.rs

//! `SplitTablet`, `GetTableLocations`, `GetTabletLocations` (spec.md §6).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::core::ids::{TableId, TabletId};
use crate::core::split;
use crate::core::state::MasterState;
use crate::rpc::envelope::{ApiError, ApiResult};

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(crate::core::errors::CatalogError::InvalidArgument(format!("malformed {what} id '{raw}'"))))
}

#[derive(Debug, Serialize)]
pub struct SplitTabletResponse {
    pub parent_tablet_id: String,
    pub child_tablet_ids: Vec<String>,
}

pub async fn split_tablet(State(state): State<Arc<MasterState>>, Path(tablet_id): Path<String>) -> ApiResult<SplitTabletResponse> {
    let tablet_id: TabletId = parse_id(&tablet_id, "tablet")?;

    let (table, tablet) = {
        let maps = state.catalog.lock();
        let tablet = maps.tablets_by_id.get(&tablet_id).cloned().ok_or_else(|| crate::core::errors::CatalogError::NotFound(format!("tablet {tablet_id}")))?;
        let table_id = tablet.metadata().read().owning_table;
        let table = maps.tables_by_id.get(&table_id).cloned().ok_or_else(|| crate::core::errors::CatalogError::NotFound(format!("table {table_id}")))?;
        (table, tablet)
    };

    let outcome = split::split_tablet(&state, &table, &tablet).await?;
    Ok(Json(SplitTabletResponse {
        parent_tablet_id: outcome.parent.to_string(),
        child_tablet_ids: outcome.children.iter().map(|id| id.to_string()).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct TabletLocation {
    pub tablet_id: String,
    pub partition_start: Vec<u8>,
    pub partition_end: Option<Vec<u8>>,
    pub leader: Option<String>,
    pub replicas: Vec<String>,
}

pub async fn get_table_locations(State(state): State<Arc<MasterState>>, Path(table_id): Path<String>) -> ApiResult<Vec<TabletLocation>> {
    let table_id: TableId = parse_id(&table_id, "table")?;
    let table = state
        .catalog
        .lock()
        .tables_by_id
        .get(&table_id)
        .cloned()
        .ok_or_else(|| ApiError(crate::core::errors::CatalogError::NotFound(format!("table {table_id}"))))?;

    let out = table
        .get_tablets(false)
        .into_iter()
        .map(|tablet| {
            let meta = tablet.metadata().read();
            TabletLocation {
                tablet_id: tablet.id.to_string(),
                partition_start: meta.partition.start.clone(),
                partition_end: meta.partition.end.clone(),
                leader: tablet.get_leader().map(|id| id.to_string()),
                replicas: meta.replica_locations.keys().map(|id| id.to_string()).collect(),
            }
        })
        .collect();
    Ok(Json(out))
}

pub async fn get_tablet_locations(State(state): State<Arc<MasterState>>, Path(tablet_id): Path<String>) -> ApiResult<TabletLocation> {
    let tablet_id: TabletId = parse_id(&tablet_id, "tablet")?;
    let tablet = state
        .catalog
        .lock()
        .tablets_by_id
        .get(&tablet_id)
        .cloned()
        .ok_or_else(|| ApiError(crate::core::errors::CatalogError::NotFound(format!("tablet {tablet_id}"))))?;
    let meta = tablet.metadata().read();
    Ok(Json(TabletLocation {
        tablet_id: tablet_id.to_string(),
        partition_start: meta.partition.start.clone(),
        partition_end: meta.partition.end.clone(),
        leader: tablet.get_leader().map(|id| id.to_string()),
        replicas: meta.replica_locations.keys().map(|id| id.to_string()).collect(),
    }))
}
