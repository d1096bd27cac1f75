// src/rpc/heartbeat.rs

//! `TSHeartbeat` (spec.md §6): tablet report intake. Registers the reporting
//! tserver in the registry (first heartbeat or a refresh of its liveness
//! timestamp) then hands the tablet report to
//! `core::heartbeat::process_tablet_report`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::core::entities::types::{ConsensusState, TabletState};
use crate::core::heartbeat::{ReportedTablet, TabletReport, process_tablet_report};
use crate::core::ids::{TabletId, TserverId};
use crate::core::state::MasterState;
use crate::core::tserver::TserverDescriptor;
use crate::rpc::envelope::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ReportedTabletBody {
    pub tablet_id: String,
    pub reported_state: TabletState,
    pub schema_version: u64,
    pub committed_consensus_state: Option<ConsensusState>,
    pub reported_visible: bool,
    pub on_disk_size_bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatBody {
    pub tserver_id: String,
    pub rpc_addr: String,
    pub cloud_info: crate::core::entities::types::CloudInfo,
    pub is_incremental: bool,
    #[serde(default)]
    pub updated_tablets: Vec<ReportedTabletBody>,
    #[serde(default)]
    pub remaining_tablet_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub processed_tablet_ids: Vec<String>,
    pub processing_truncated: bool,
}

pub async fn heartbeat(State(state): State<Arc<MasterState>>, Json(body): Json<HeartbeatBody>) -> ApiResult<HeartbeatResponse> {
    let tserver_id: TserverId = body
        .tserver_id
        .parse()
        .map_err(|_| ApiError(crate::core::errors::CatalogError::InvalidArgument(format!("malformed tserver id '{}'", body.tserver_id))))?;

    let now_ms = {
        let existing = state.tservers.get(&tserver_id);
        existing.as_ref().map(|d| d.last_heartbeat_ms).unwrap_or(0) + 1
    };
    state.tservers.upsert(TserverDescriptor {
        id: tserver_id,
        rpc_addr: body.rpc_addr,
        cloud_info: body.cloud_info,
        last_heartbeat_ms: now_ms,
        is_blacklisted: false,
        is_leader_blacklisted: false,
        recent_replica_creations: 0,
    });

    let mut updated_tablets = Vec::with_capacity(body.updated_tablets.len());
    for t in body.updated_tablets {
        let tablet_id: TabletId = t
            .tablet_id
            .parse()
            .map_err(|_| ApiError(crate::core::errors::CatalogError::InvalidArgument(format!("malformed tablet id '{}'", t.tablet_id))))?;
        updated_tablets.push(ReportedTablet {
            tablet_id,
            reported_state: t.reported_state,
            schema_version: t.schema_version,
            committed_consensus_state: t.committed_consensus_state,
            reported_visible: t.reported_visible,
            on_disk_size_bytes: t.on_disk_size_bytes,
        });
    }

    let report = TabletReport {
        tserver: tserver_id,
        is_incremental: body.is_incremental,
        updated_tablets,
        remaining_tablet_count: body.remaining_tablet_count,
    };

    let updates = process_tablet_report(&state, report).await?;
    Ok(Json(HeartbeatResponse {
        processed_tablet_ids: updates.processed_tablet_ids.iter().map(|id| id.to_string()).collect(),
        processing_truncated: updates.processing_truncated,
    }))
}
