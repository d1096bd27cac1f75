// tests/integration/heartbeat_test.rs

//! Concrete end-to-end scenarios 4-5 from spec.md §8: stale heartbeat
//! reports are ignored, and a replica that drops out of a newly-committed
//! raft config gets evicted from the tracked replica set.

use std::sync::{Arc, Mutex};

use catalog_manager::config::MasterConfig;
use catalog_manager::core::entities::types::{ConsensusState, MemberType, RaftConfig, Replica, ReplicaRole, ReplicaState, TabletState};
use catalog_manager::core::heartbeat::report::{ReportedTablet, TabletReport, process_tablet_report};
use catalog_manager::core::ids::{TableId, TabletId, TserverId};
use catalog_manager::core::state::MasterState;
use catalog_manager::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
use catalog_manager::core::tserver::TserverProxy;

use crate::integration::harness::{create_test_namespace, create_test_table, leader_ready_state, register_tservers};

/// Records every `delete_replica` call it receives; every other RPC is a
/// no-op success, mirroring `FakeTserverProxy`.
#[derive(Default)]
struct RecordingTserverProxy {
    delete_replica_calls: Mutex<Vec<(TserverId, TabletId, bool, Option<i64>)>>,
}

#[async_trait::async_trait]
impl TserverProxy for RecordingTserverProxy {
    async fn create_replica(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete_replica(&self, tserver: TserverId, tablet: TabletId, tombstone: bool, opid_index_less_or_equal: Option<i64>) -> anyhow::Result<()> {
        self.delete_replica_calls.lock().unwrap().push((tserver, tablet, tombstone, opid_index_less_or_equal));
        Ok(())
    }

    async fn alter_table(&self, _tserver: TserverId, _tablet: TabletId, _table: TableId, _version: u64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_server(&self, _tserver: TserverId, _tablet: TabletId, _new_peer: TserverId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_server(&self, _tserver: TserverId, _tablet: TabletId, _peer: TserverId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn try_step_down(&self, _tserver: TserverId, _tablet: TabletId, _new_leader_hint: Option<TserverId>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start_election(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn split_tablet(&self, _tserver: TserverId, _tablet: TabletId, _children: Vec<TabletId>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_tablet_split_key(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
        Ok((vec![0x80], vec![0x80]))
    }

    async fn add_table_to_tablet(&self, _tserver: TserverId, _tablet: TabletId, _table: TableId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_table_from_tablet(&self, _tserver: TserverId, _tablet: TabletId, _table: TableId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn truncate_tablet(&self, _tserver: TserverId, _tablet: TabletId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn copartition_table(&self, _tserver: TserverId, _tablet: TabletId, _source_table: TableId) -> anyhow::Result<()> {
        Ok(())
    }
}

fn running_replica() -> Replica {
    Replica {
        role: ReplicaRole::Follower,
        member_type: MemberType::Voter,
        state: ReplicaState::Running,
        fs_data_dir: String::new(),
        drive_info: None,
        time_updated_ms: 0,
        should_disable_lb_move: false,
    }
}

/// Builds a table with one tablet already RUNNING under a committed
/// 3-replica config at `(term, opid_index)`, bypassing the assignment
/// pipeline so the test controls the exact baseline consensus state.
async fn table_with_established_tablet(
    state: &std::sync::Arc<catalog_manager::core::state::MasterState>,
    peers: &[TserverId],
    term: i64,
    opid_index: i64,
) -> (catalog_manager::core::ids::TableId, catalog_manager::core::ids::TabletId) {
    let ns = create_test_namespace(state, "sys").await;
    let table_id = create_test_table(state, ns, "events", 1, peers.len()).await;
    let table = state.catalog.lock().tables_by_id.get(&table_id).cloned().unwrap();
    let tablet = table.get_tablets(false).into_iter().next().unwrap();

    let mut guard = tablet.metadata().start_mutation().await;
    guard.dirty.state = TabletState::Running;
    for peer in peers {
        guard.dirty.replica_locations.insert(*peer, running_replica());
    }
    guard.dirty.committed_consensus_state =
        Some(ConsensusState { current_term: term, config: RaftConfig { opid_index, peers: peers.to_vec() }, leader_uuid: Some(peers[0]) });
    guard.commit();

    (table_id, tablet.id)
}

/// Scenario 4: a report carrying a lower `opid_index` at the same term than
/// what's already committed is stale and must not mutate tracked state.
#[tokio::test]
async fn stale_heartbeat_report_is_ignored() {
    let state = leader_ready_state().await;
    let peers = register_tservers(&state, 3, "zone1");
    let (_table_id, tablet_id) = table_with_established_tablet(&state, &peers, 3, 7).await;

    let report = TabletReport {
        tserver: peers[0],
        is_incremental: true,
        updated_tablets: vec![ReportedTablet {
            tablet_id,
            reported_state: TabletState::Running,
            schema_version: 0,
            committed_consensus_state: Some(ConsensusState {
                current_term: 3,
                config: RaftConfig { opid_index: 6, peers: peers.clone() },
                leader_uuid: Some(peers[0]),
            }),
            reported_visible: true,
            on_disk_size_bytes: 512,
        }],
        remaining_tablet_count: 0,
    };

    let updates = process_tablet_report(&state, report).await.unwrap();
    assert_eq!(updates.processed_tablet_ids, vec![tablet_id]);

    let tablet = state.catalog.lock().tablets_by_id.get(&tablet_id).cloned().unwrap();
    let cstate = tablet.metadata().read().committed_consensus_state.clone().unwrap();
    assert_eq!(cstate.config.opid_index, 7, "stale report must not roll back the committed opid_index");
    assert_eq!(cstate.current_term, 3);
    assert_eq!(tablet.get_replica_locations().len(), 3, "stale report must not change the replica set");
}

/// Scenario 5: a freshly-committed config that drops a peer evicts it from
/// the tracked replica set and admits whichever peer replaced it.
#[tokio::test]
async fn evicted_replica_drops_out_of_replica_map() {
    let state = leader_ready_state().await;
    let peers = register_tservers(&state, 3, "zone1");
    let (_table_id, tablet_id) = table_with_established_tablet(&state, &peers, 3, 10).await;

    let replacement = register_tservers(&state, 1, "zone1").remove(0);
    let new_peers = vec![peers[0], peers[1], replacement];

    let report = TabletReport {
        tserver: peers[0],
        is_incremental: true,
        updated_tablets: vec![ReportedTablet {
            tablet_id,
            reported_state: TabletState::Running,
            schema_version: 0,
            committed_consensus_state: Some(ConsensusState {
                current_term: 3,
                config: RaftConfig { opid_index: 11, peers: new_peers.clone() },
                leader_uuid: Some(peers[0]),
            }),
            reported_visible: true,
            on_disk_size_bytes: 1024,
        }],
        remaining_tablet_count: 0,
    };

    process_tablet_report(&state, report).await.unwrap();

    let tablet = state.catalog.lock().tablets_by_id.get(&tablet_id).cloned().unwrap();
    let locations = tablet.get_replica_locations();
    assert!(!locations.contains_key(&peers[2]), "evicted replica must be dropped from the replica map");
    assert!(locations.contains_key(&replacement), "replacement replica must be tracked once committed");
    assert_eq!(locations.len(), 3);

    let cstate = tablet.metadata().read().committed_consensus_state.clone().unwrap();
    assert_eq!(cstate.config.opid_index, 11);
}

/// Scenario 5, bound check: the evicted peer's tombstone must be bounded by
/// the *previous* committed config's opid_index (10), not the new one (11).
#[tokio::test]
async fn evicted_replica_tombstone_uses_previous_opid_index() {
    let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
    let proxy = Arc::new(RecordingTserverProxy::default());
    let state = MasterState::new(MasterConfig::default(), gateway, proxy.clone());
    state.set_current_term(1);
    state.set_leader_ready_term(1);

    let peers = register_tservers(&state, 3, "zone1");
    let (_table_id, tablet_id) = table_with_established_tablet(&state, &peers, 3, 10).await;

    let replacement = register_tservers(&state, 1, "zone1").remove(0);
    let new_peers = vec![peers[0], peers[1], replacement];

    let report = TabletReport {
        tserver: peers[0],
        is_incremental: true,
        updated_tablets: vec![ReportedTablet {
            tablet_id,
            reported_state: TabletState::Running,
            schema_version: 0,
            committed_consensus_state: Some(ConsensusState {
                current_term: 3,
                config: RaftConfig { opid_index: 11, peers: new_peers.clone() },
                leader_uuid: Some(peers[0]),
            }),
            reported_visible: true,
            on_disk_size_bytes: 1024,
        }],
        remaining_tablet_count: 0,
    };

    process_tablet_report(&state, report).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let calls = proxy.delete_replica_calls.lock().unwrap();
    let evicted_call = calls.iter().find(|(tserver, tablet, ..)| *tserver == peers[2] && *tablet == tablet_id);
    let (_, _, tombstone, opid_index_less_or_equal) = evicted_call.expect("evicted peer should have been sent a delete_replica call");
    assert!(*tombstone, "evicted peer must be tombstoned");
    assert_eq!(*opid_index_less_or_equal, Some(10), "tombstone bound must be the previous committed opid_index, not the new one");
}
