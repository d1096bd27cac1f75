// src/rpc/cluster_config.rs

//! `GetClusterConfig`, `ChangeMasterClusterConfig`, `SetPreferredZones`
//! (spec.md §6). The cluster config is a process-wide singleton persisted
//! under one fixed id, the same convention `core::lifecycle` uses when
//! loading it at startup.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::core::entities::cluster_config::ClusterReplicationInfo;
use crate::core::entities::types::CloudInfo;
use crate::core::state::MasterState;
use crate::core::syscatalog::{EntityRow, EntityType};
use crate::rpc::envelope::{ApiError, ApiResult};

const CLUSTER_CONFIG_ID: &str = "cluster_config";

#[derive(Debug, Serialize)]
pub struct ClusterConfigResponse {
    pub version: u64,
    pub cluster_uuid: String,
    pub replication_info: ClusterReplicationInfo,
}

pub async fn get_cluster_config(State(state): State<Arc<MasterState>>) -> ApiResult<ClusterConfigResponse> {
    let meta = state.cluster_config.metadata().read();
    Ok(Json(ClusterConfigResponse {
        version: meta.version,
        cluster_uuid: meta.cluster_uuid.to_string(),
        replication_info: meta.replication_info.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangeClusterConfigBody {
    pub expected_version: u64,
    pub replication_info: ClusterReplicationInfo,
}

pub async fn change_master_cluster_config(
    State(state): State<Arc<MasterState>>,
    Json(body): Json<ChangeClusterConfigBody>,
) -> ApiResult<ClusterConfigResponse> {
    state.require_leader_ready().map_err(ApiError)?;

    let mut guard = state.cluster_config.metadata().start_mutation().await;
    if guard.dirty.version != body.expected_version {
        return Err(ApiError(crate::core::errors::CatalogError::IllegalState(format!(
            "cluster config version mismatch: expected {}, have {}",
            body.expected_version, guard.dirty.version
        ))));
    }
    guard.dirty.replication_info = body.replication_info;
    guard.dirty.version += 1;

    let row = EntityRow::new(EntityType::ClusterConfig, CLUSTER_CONFIG_ID, &guard.dirty).map_err(|e| ApiError(crate::core::errors::CatalogError::Internal(e.to_string())))?;
    let term = state.current_term();
    state.gateway.upsert(term, term, vec![row]).await.map_err(ApiError)?;

    let response = ClusterConfigResponse { version: guard.dirty.version, cluster_uuid: guard.dirty.cluster_uuid.to_string(), replication_info: guard.dirty.replication_info.clone() };
    guard.commit();
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SetPreferredZonesBody {
    pub zones: Vec<CloudInfo>,
}

pub async fn set_preferred_zones(State(state): State<Arc<MasterState>>, Json(body): Json<SetPreferredZonesBody>) -> ApiResult<ClusterConfigResponse> {
    state.require_leader_ready().map_err(ApiError)?;

    let mut guard = state.cluster_config.metadata().start_mutation().await;
    guard.dirty.replication_info.affinitized_leaders = body.zones;
    guard.dirty.version += 1;

    let row = EntityRow::new(EntityType::ClusterConfig, CLUSTER_CONFIG_ID, &guard.dirty).map_err(|e| ApiError(crate::core::errors::CatalogError::Internal(e.to_string())))?;
    let term = state.current_term();
    state.gateway.upsert(term, term, vec![row]).await.map_err(ApiError)?;

    let response = ClusterConfigResponse { version: guard.dirty.version, cluster_uuid: guard.dirty.cluster_uuid.to_string(), replication_info: guard.dirty.replication_info.clone() };
    guard.commit();
    Ok(Json(response))
}
