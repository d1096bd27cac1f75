// src/rpc/mod.rs

//! The administrative RPC surface (spec.md §6): JSON-over-HTTP handlers via
//! `axum`, grounded on the teacher's own choice of `axum` for its metrics
//! and admin endpoints (`server/metrics_server.rs`). Every handler
//! delegates to `core::` logic and only owns (de)serialization and error
//! envelope mapping (`rpc::envelope`).

pub mod cluster_config;
pub mod envelope;
pub mod heartbeat;
pub mod namespaces;
pub mod tablegroups;
pub mod tables;
pub mod tablets;
pub mod udtypes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};

use crate::core::state::MasterState;

pub fn router(state: Arc<MasterState>) -> Router {
    Router::new()
        .route("/namespaces", post(namespaces::create_namespace).get(namespaces::list_namespaces))
        .route(
            "/namespaces/{id}",
            put(namespaces::alter_namespace).delete(namespaces::delete_namespace).get(namespaces::get_namespace_info),
        )
        .route("/namespaces/{id}/reserve-oids", post(namespaces::reserve_pgsql_oids))
        .route("/tables", post(tables::create_table).get(tables::list_tables))
        .route("/tables/{id}", get(tables::get_table_schema).delete(tables::delete_table))
        .route("/tables/{id}/alter", post(tables::alter_table))
        .route("/tables/{id}/truncate", post(tables::truncate_table))
        .route("/tables/{id}/locations", get(tablets::get_table_locations))
        .route("/tablegroups", post(tablegroups::create_tablegroup).get(tablegroups::list_tablegroups))
        .route("/tablegroups/{id}", axum::routing::delete(tablegroups::delete_tablegroup))
        .route("/udtypes", post(udtypes::create_udtype).get(udtypes::list_udtypes))
        .route("/udtypes/{id}", get(udtypes::get_udtype_info).delete(udtypes::delete_udtype))
        .route("/tablets/{id}/split", post(tablets::split_tablet))
        .route("/tablets/{id}/locations", get(tablets::get_tablet_locations))
        .route("/cluster-config", get(cluster_config::get_cluster_config).put(cluster_config::change_master_cluster_config))
        .route("/cluster-config/preferred-zones", put(cluster_config::set_preferred_zones))
        .route("/heartbeat", post(heartbeat::heartbeat))
        .with_state(state)
}
