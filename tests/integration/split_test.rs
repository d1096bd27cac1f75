// tests/integration/split_test.rs

//! Concrete end-to-end scenario 6 from spec.md §8: split eligibility gating
//! at the per-table tablet limit, phase-based size threshold escalation, and
//! a full `split_tablet` run producing two CREATING children.

use catalog_manager::config::MasterConfig;
use catalog_manager::core::entities::types::{ConsensusState, MemberType, RaftConfig, Replica, ReplicaRole, ReplicaState, TabletState};
use catalog_manager::core::errors::CatalogError;
use catalog_manager::core::split::{should_split_valid_candidate, split_tablet, validate_split_candidate};

use crate::integration::harness::{create_test_namespace, create_test_table, leader_ready_state, register_tservers};

/// Promotes a table's single tablet to RUNNING with a committed leader,
/// mirroring the state the assignment pipeline would have produced.
async fn make_tablet_running_with_leader(state: &std::sync::Arc<catalog_manager::core::state::MasterState>, tablet: &std::sync::Arc<catalog_manager::core::entities::TabletInfo>, leader: catalog_manager::core::ids::TserverId) {
    let _ = state;
    let mut guard = tablet.metadata().start_mutation().await;
    guard.dirty.state = TabletState::Running;
    guard.dirty.replica_locations.insert(
        leader,
        Replica { role: ReplicaRole::Leader, member_type: MemberType::Voter, state: ReplicaState::Running, fs_data_dir: String::new(), drive_info: None, time_updated_ms: 0, should_disable_lb_move: false },
    );
    guard.dirty.committed_consensus_state = Some(ConsensusState { current_term: 1, config: RaftConfig { opid_index: 1, peers: vec![leader] }, leader_uuid: Some(leader) });
    guard.commit();
}

/// Gating: a table already at `tablet_split_limit_per_table` partitions is
/// rejected regardless of how large its tablets have grown.
#[tokio::test]
async fn split_rejected_once_table_reaches_tablet_limit() {
    let state = leader_ready_state().await;
    let peers = register_tservers(&state, 1, "zone1");
    let ns = create_test_namespace(&state, "sys").await;

    let mut cfg = state.config.read().await.clone();
    cfg.tablet_split_limit_per_table = 1;
    *state.config.write().await = cfg.clone();

    let table_id = create_test_table(&state, ns, "events", 1, 1).await;
    let table = state.catalog.lock().tables_by_id.get(&table_id).cloned().unwrap();
    let tablet = table.get_tablets(false).into_iter().next().unwrap();
    make_tablet_running_with_leader(&state, &tablet, peers[0]).await;

    let err = validate_split_candidate(&state, &cfg, &table, &tablet).unwrap_err();
    assert!(matches!(err, CatalogError::ReachedSplitLimit(_)));
}

/// Phase escalation: the same on-disk size clears the low-phase threshold
/// but is rejected once enough tablets are packed onto the leader's node to
/// push the decision into the high or force phase.
#[tokio::test]
async fn should_split_escalates_threshold_by_node_tablet_count() {
    let cfg = MasterConfig::default();
    let state = leader_ready_state().await;
    let peers = register_tservers(&state, 1, "zone1");
    let ns = create_test_namespace(&state, "sys").await;
    let table_id = create_test_table(&state, ns, "events", 1, 1).await;
    let table = state.catalog.lock().tables_by_id.get(&table_id).cloned().unwrap();
    let tablet = table.get_tablets(false).into_iter().next().unwrap();
    make_tablet_running_with_leader(&state, &tablet, peers[0]).await;

    let size_between_low_and_high = cfg.split_low_size_threshold_bytes + 1;
    {
        let mut guard = tablet.metadata().start_mutation().await;
        guard.dirty.on_disk_size_bytes = size_between_low_and_high;
        guard.commit();
    }

    assert!(
        should_split_valid_candidate(&cfg, &tablet, cfg.split_low_phase_tablet_threshold.saturating_sub(1)),
        "a tablet above the low threshold on a lightly-loaded node should split"
    );
    assert!(
        !should_split_valid_candidate(&cfg, &tablet, cfg.split_high_phase_tablet_threshold + 1),
        "the same size must not clear the force-phase threshold on a heavily-loaded node"
    );
}

/// End-to-end: a valid RUNNING tablet with a leader splits into two CREATING
/// children at double the split depth, and the parent is marked REPLACED.
#[tokio::test]
async fn split_tablet_produces_two_creating_children() {
    let state = leader_ready_state().await;
    let peers = register_tservers(&state, 1, "zone1");
    let ns = create_test_namespace(&state, "sys").await;
    let table_id = create_test_table(&state, ns, "events", 1, 1).await;
    let table = state.catalog.lock().tables_by_id.get(&table_id).cloned().unwrap();
    let tablet = table.get_tablets(false).into_iter().next().unwrap();
    make_tablet_running_with_leader(&state, &tablet, peers[0]).await;

    let outcome = split_tablet(&state, &table, &tablet).await.unwrap();

    assert_eq!(tablet.metadata().read().state, TabletState::Replaced);
    assert_eq!(outcome.parent, tablet.id);
    assert_ne!(outcome.children[0], outcome.children[1]);

    for child_id in outcome.children {
        let child = state.catalog.lock().tablets_by_id.get(&child_id).cloned().unwrap();
        let meta = child.metadata().read();
        assert_eq!(meta.state, TabletState::Creating);
        assert_eq!(meta.split_parent_tablet_id, Some(tablet.id));
        assert_eq!(meta.split_depth, 1);
    }
}

/// A tablet that's already been split once can't be split again directly.
#[tokio::test]
async fn split_of_replaced_tablet_is_rejected() {
    let state = leader_ready_state().await;
    let peers = register_tservers(&state, 1, "zone1");
    let ns = create_test_namespace(&state, "sys").await;
    let table_id = create_test_table(&state, ns, "events", 1, 1).await;
    let table = state.catalog.lock().tables_by_id.get(&table_id).cloned().unwrap();
    let tablet = table.get_tablets(false).into_iter().next().unwrap();
    make_tablet_running_with_leader(&state, &tablet, peers[0]).await;

    split_tablet(&state, &table, &tablet).await.unwrap();
    let err = split_tablet(&state, &table, &tablet).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidArgument(_)));
}
