// tests/integration/harness.rs

//! Shared fixtures for end-to-end scenarios: a leader-ready `MasterState`
//! over an in-memory sys-catalog and a handful of registered tservers,
//! mirroring the `TestContext` pattern the teacher uses to drive commands
//! against a real in-process `ServerState` rather than a live socket.

use std::sync::Arc;

use catalog_manager::config::MasterConfig;
use catalog_manager::core::ddl::namespace::{CreateNamespaceRequest, create_namespace};
use catalog_manager::core::ddl::table::{CreateTableRequest, create_table};
use catalog_manager::core::entities::types::{CloudInfo, ColumnSchema, DatabaseType, ReplicationInfo, Schema, TableType};
use catalog_manager::core::ids::{NamespaceId, TableId, TserverId};
use catalog_manager::core::state::MasterState;
use catalog_manager::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
use catalog_manager::core::tserver::{FakeTserverProxy, TserverDescriptor};

/// Builds a `MasterState` already at term 1 and leader-ready, the same
/// starting point `server::initialization::setup` produces for a freshly
/// started process, skipping the startup logging/CLI concerns tests don't
/// need.
pub async fn leader_ready_state() -> Arc<MasterState> {
    let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
    let state = MasterState::new(MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
    state.set_current_term(1);
    state.set_leader_ready_term(1);
    state
}

pub fn register_tservers(state: &Arc<MasterState>, n: usize, zone: &str) -> Vec<TserverId> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let id = TserverId::generate();
        state.tservers.upsert(TserverDescriptor {
            id,
            rpc_addr: format!("10.0.0.{i}:9100"),
            cloud_info: CloudInfo { cloud: "cloud1".into(), region: "datacenter1".into(), zone: zone.into() },
            last_heartbeat_ms: 0,
            is_blacklisted: false,
            is_leader_blacklisted: false,
            recent_replica_creations: 0,
        });
        ids.push(id);
    }
    ids
}

pub async fn create_test_namespace(state: &Arc<MasterState>, name: &str) -> NamespaceId {
    create_namespace(state, CreateNamespaceRequest { name: name.into(), database_type: DatabaseType::Cql, colocated: false, source_namespace_id: None })
        .await
        .unwrap()
}

fn simple_schema() -> Schema {
    Schema {
        columns: vec![ColumnSchema { id: 0, name: "id".into(), data_type: "int32".into(), is_key: true, is_hash_key: true, is_nullable: false }],
        next_column_id: 1,
    }
}

pub async fn create_test_table(state: &Arc<MasterState>, namespace_id: NamespaceId, name: &str, num_tablets: usize, replication_factor: usize) -> TableId {
    create_table(
        state,
        CreateTableRequest {
            name: name.into(),
            namespace_id,
            table_type: TableType::UserTable,
            schema: simple_schema(),
            num_tablets: Some(num_tablets),
            replication_info: Some(ReplicationInfo::simple(replication_factor)),
            colocated: false,
            tablegroup_id: None,
            index_of: None,
        },
    )
    .await
    .unwrap()
}
