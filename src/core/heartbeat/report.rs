// src/core/heartbeat/report.rs

//! `TabletReport` ingestion (spec.md §4.7 steps 1-8): reconciles one tserver's
//! report of what it's hosting against catalog state, persists whatever
//! changed, and fans out follow-up RPCs. Grounded on the teacher's batched
//! gossip-digest reconciliation (`core/cluster/gossip.rs`): resolve each
//! reported item, skip what's unknown, mutate what's stale, dispatch what's
//! needed, and bail out cleanly if the budget runs out mid-pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::core::entities::types::{ConsensusState, HideState, MemberType, Replica, ReplicaRole, ReplicaState, TableState, TabletState};
use crate::core::entities::{TableInfo, TabletInfo};
use crate::core::errors::CatalogError;
use crate::core::ids::{TabletId, TserverId};
use crate::core::state::MasterState;
use crate::core::tasks::alter_table::AlterTableTask;
use crate::core::tasks::create_replica::CreateReplicaTask;
use crate::core::tasks::delete_replica::DeleteReplicaTask;
use crate::core::tasks::framework::{RetryPolicy, TaskOutcome, run_with_retry};
use crate::core::tasks::start_election::StartElectionTask;

/// One tablet entry inside a `TabletReport` (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct ReportedTablet {
    pub tablet_id: TabletId,
    /// The tserver's own view of the tablet's replication state.
    pub reported_state: TabletState,
    pub schema_version: u64,
    pub committed_consensus_state: Option<ConsensusState>,
    /// True if the tserver still considers this replica live and visible,
    /// used to detect hide-only replicas the catalog wants torn down.
    pub reported_visible: bool,
    /// On-disk size as last measured by the tserver, feeding the split
    /// pipeline's size-threshold phases (spec.md §4.9).
    pub on_disk_size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct TabletReport {
    pub tserver: TserverId,
    pub is_incremental: bool,
    pub updated_tablets: Vec<ReportedTablet>,
    pub remaining_tablet_count: usize,
}

#[derive(Debug, Default)]
pub struct TabletReportUpdates {
    pub processed_tablet_ids: Vec<TabletId>,
    pub processing_truncated: bool,
}

fn retry_policy(cfg: &crate::config::MasterConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: cfg.async_task_max_retries,
        initial_backoff: Duration::from_millis(cfg.async_task_initial_backoff_ms),
        max_backoff: Duration::from_millis(cfg.async_task_max_backoff_ms),
    }
}

/// Dispatches `AsyncDeleteReplica` to `tserver`. `tombstone=false` covers both
/// the plain DELETED case and the hide-only case (spec.md §4.7 step 4) —
/// they share the same wire shape and differ only in which branch below
/// triggered them.
fn spawn_delete_replica(
    state: &Arc<MasterState>,
    table: &Arc<TableInfo>,
    tserver: TserverId,
    tablet_id: TabletId,
    tombstone: bool,
    opid_index_less_or_equal: Option<i64>,
    policy: RetryPolicy,
) {
    let task = DeleteReplicaTask::new(table.id, tserver, tablet_id, tombstone, opid_index_less_or_equal, state.tserver_proxy.clone());
    table.add_task(task.clone());
    let table = table.clone();
    tokio::spawn(async move {
        run_with_retry(task, policy, || table.metadata().read().state == TableState::Deleting).await;
    });
}

fn spawn_alter_table(state: &Arc<MasterState>, table: &Arc<TableInfo>, tserver: TserverId, tablet_id: TabletId, version: u64, policy: RetryPolicy) {
    let task = AlterTableTask::new(table.id, tserver, tablet_id, version, None, state.tserver_proxy.clone());
    table.add_task(task.clone());
    let table_for_retry = table.clone();
    tokio::spawn(async move {
        run_with_retry(task, policy, || table_for_retry.metadata().read().state == TableState::Deleting).await;
    });
}

fn spawn_create_replica(state: &Arc<MasterState>, table: &Arc<TableInfo>, tserver: TserverId, tablet_id: TabletId, policy: RetryPolicy) {
    let task = CreateReplicaTask::new(table.id, tserver, tablet_id, state.tserver_proxy.clone());
    table.add_task(task.clone());
    let table_for_retry = table.clone();
    tokio::spawn(async move {
        run_with_retry(task, policy, || table_for_retry.metadata().read().state == TableState::Deleting).await;
    });
}

fn maybe_start_election(state: &Arc<MasterState>, table: &Arc<TableInfo>, tablet: &Arc<TabletInfo>, hint: TserverId, policy: RetryPolicy) {
    if !tablet.try_initiate_election() {
        return;
    }
    let task = StartElectionTask::new(table.id, hint, tablet.id, state.tserver_proxy.clone());
    table.add_task(task.clone());
    let tablet = tablet.clone();
    tokio::spawn(async move {
        if run_with_retry(task, policy, || false).await != TaskOutcome::Success {
            tablet.reset_election_guard();
        }
    });
}

/// Reconciles one reported tablet against catalog state, persisting whatever
/// mutation is needed and dispatching follow-up RPCs (spec.md §4.7 step 4).
/// Returns `true` if the tablet's persisted metadata changed.
async fn reconcile_tablet(
    state: &Arc<MasterState>,
    table: &Arc<TableInfo>,
    tablet: &Arc<TabletInfo>,
    tserver: TserverId,
    reported: &ReportedTablet,
    policy: RetryPolicy,
) -> Result<bool, CatalogError> {
    let (tablet_state, prev_cstate, table_state, table_hide_state, table_version) = {
        let t = tablet.metadata().read();
        let tm = table.metadata().read();
        (t.state, t.committed_consensus_state.clone(), tm.state, tm.hide_state, tm.version)
    };

    if tablet_state == TabletState::Deleted || table_state == TableState::Deleting {
        spawn_delete_replica(state, table, tserver, tablet.id, false, None, policy);
        return Ok(false);
    }

    if matches!(table_hide_state, HideState::Hiding | HideState::Hidden) && reported.reported_visible {
        spawn_delete_replica(state, table, tserver, tablet.id, false, None, policy);
    }

    if let (Some(prev), Some(new_cs)) = (&prev_cstate, &reported.committed_consensus_state) {
        if new_cs.config.opid_index < prev.config.opid_index && !prev.config.peers.contains(&tserver) {
            spawn_delete_replica(state, table, tserver, tablet.id, true, Some(prev.config.opid_index), policy);
        }
    }

    let mut mutated = false;

    if let Some(new_cs) = &reported.committed_consensus_state {
        let stale = prev_cstate
            .as_ref()
            .map(|c| new_cs.current_term < c.current_term || (new_cs.current_term == c.current_term && new_cs.config.opid_index < c.config.opid_index))
            .unwrap_or(false);

        if !stale {
            let mut effective_cs = new_cs.clone();
            if let Some(leader) = effective_cs.leader_uuid {
                if !effective_cs.config.peers.contains(&leader) {
                    effective_cs.leader_uuid = None;
                }
            }

            let old_peers: Vec<TserverId> = prev_cstate.as_ref().map(|c| c.config.peers.clone()).unwrap_or_default();
            let prev_opid_index = prev_cstate.as_ref().map(|c| c.config.opid_index);
            let config_advanced = prev_cstate.as_ref().map(|c| c.config.opid_index != new_cs.config.opid_index).unwrap_or(true);
            let leader_changed = prev_cstate.as_ref().and_then(|c| c.leader_uuid) != effective_cs.leader_uuid;

            if config_advanced || leader_changed {
                for peer in &effective_cs.config.peers {
                    if !old_peers.contains(peer) {
                        spawn_create_replica(state, table, *peer, tablet.id, policy);
                    }
                }
                for peer in &old_peers {
                    if !effective_cs.config.peers.contains(peer) {
                        spawn_delete_replica(state, table, *peer, tablet.id, true, prev_opid_index, policy);
                    }
                }
            }

            let mut guard = tablet.metadata().start_mutation().await;
            if guard.dirty.state != TabletState::Running && reported.reported_state == TabletState::Running && effective_cs.leader_uuid.is_some() {
                guard.dirty.state = TabletState::Running;
            }
            for peer in &effective_cs.config.peers {
                guard
                    .dirty
                    .replica_locations
                    .entry(*peer)
                    .and_modify(|r| {
                        if Some(*peer) == effective_cs.leader_uuid {
                            r.role = ReplicaRole::Leader;
                        } else if r.role == ReplicaRole::Leader {
                            r.role = ReplicaRole::Follower;
                        }
                    })
                    .or_insert(Replica {
                        role: if Some(*peer) == effective_cs.leader_uuid { ReplicaRole::Leader } else { ReplicaRole::Follower },
                        member_type: MemberType::Voter,
                        state: ReplicaState::Running,
                        fs_data_dir: String::new(),
                        drive_info: None,
                        time_updated_ms: 0,
                        should_disable_lb_move: false,
                    });
            }
            guard.dirty.replica_locations.retain(|peer, replica| effective_cs.config.peers.contains(peer) || replica.state == ReplicaState::Starting);
            guard.dirty.committed_consensus_state = Some(effective_cs.clone());
            guard.commit();
            mutated = true;

            if effective_cs.current_term == 0 && effective_cs.leader_uuid.is_none() {
                if let Some(hint) = effective_cs.config.peers.first().copied() {
                    maybe_start_election(state, table, tablet, hint, policy);
                }
            }
        }
    }

    if reported.schema_version < table_version {
        spawn_alter_table(state, table, tserver, tablet.id, table_version, policy);
    } else if Some(tserver) == tablet.get_leader() {
        let mut guard = tablet.metadata().start_mutation().await;
        guard.dirty.reported_schema_version.insert(table.id, reported.schema_version);
        guard.dirty.on_disk_size_bytes = reported.on_disk_size_bytes;
        guard.commit();
        mutated = true;
    }

    Ok(mutated)
}

/// Advances a table's ALTERING state machine once every active tablet has
/// reported `schema_version >= version` from its leader (spec.md §4.7 step
/// 6, `HandleTabletSchemaVersionReport`).
async fn maybe_complete_alter(table: &Arc<TableInfo>) {
    let (is_altering, version) = {
        let meta = table.metadata().read();
        (meta.state == TableState::Altering, meta.version)
    };
    if !is_altering {
        return;
    }
    let all_caught_up = table
        .get_tablets(false)
        .iter()
        .all(|t| t.metadata().read().reported_schema_version.get(&table.id).copied().unwrap_or(0) >= version);
    if !all_caught_up {
        return;
    }
    let mut guard = table.metadata().start_mutation().await;
    guard.dirty.state = TableState::Running;
    guard.dirty.fully_applied_schema = None;
    guard.commit();
    info!(table = %table.id, version, "alter complete, table back to RUNNING");
}

/// Processes one `TabletReport` end to end (spec.md §4.7 steps 1-8).
pub async fn process_tablet_report(state: &Arc<MasterState>, report: TabletReport) -> Result<TabletReportUpdates, CatalogError> {
    let cfg = state.config.read().await.clone();
    let policy = retry_policy(&cfg);
    let term_at_start = state.current_term();
    let deadline_budget = Duration::from_millis((cfg.heartbeat_deadline_ms as f64 * cfg.heartbeat_safe_deadline_fraction) as u64);
    let started = Instant::now();

    let mut sorted_input = report.updated_tablets.clone();
    sorted_input.sort_by_key(|r| r.tablet_id);

    let mut resolved: Vec<(Arc<TableInfo>, Arc<TabletInfo>, ReportedTablet)> = Vec::new();
    for reported in sorted_input {
        let found = {
            let maps = state.catalog.lock();
            maps.tablets_by_id.get(&reported.tablet_id).cloned().and_then(|tablet| {
                let owning = tablet.metadata().read().owning_table;
                maps.tables_by_id.get(&owning).cloned().map(|table| (table, tablet))
            })
        };
        // Unknown tablet, or its owning table is gone entirely: tell the
        // tserver to drop it (spec.md §4.7 step 1).
        match found {
            Some((table, tablet)) => resolved.push((table, tablet, reported)),
            None => {
                warn!(tserver = %report.tserver, tablet = %reported.tablet_id, "dropping report for unknown tablet");
            }
        }
    }

    let mut updates = TabletReportUpdates::default();
    let mut tables_to_recheck: Vec<Arc<TableInfo>> = Vec::new();

    for (table, tablet, reported) in &resolved {
        if started.elapsed() > deadline_budget {
            updates.processing_truncated = true;
            warn!(tserver = %report.tserver, processed = updates.processed_tablet_ids.len(), "heartbeat processing truncated by deadline budget");
            break;
        }
        if state.current_term() != term_at_start {
            warn!(tserver = %report.tserver, "leader term changed mid-batch, aborting report processing");
            break;
        }

        reconcile_tablet(state, table, tablet, report.tserver, reported, policy).await?;
        updates.processed_tablet_ids.push(tablet.id);
        if !tables_to_recheck.iter().any(|t| t.id == table.id) {
            tables_to_recheck.push(table.clone());
        }
    }

    for table in &tables_to_recheck {
        maybe_complete_alter(table).await;
    }

    if report.remaining_tablet_count == 0 && !updates.processing_truncated {
        info!(tserver = %report.tserver, tablets = updates.processed_tablet_ids.len(), "tablet report fully delivered");
    }

    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::types::{CloudInfo, ConsensusState, PartitionKeyRange, RaftConfig, ReplicationInfo, Schema, TableType};
    use crate::core::entities::{TableMetadata, TabletMetadata};
    use crate::core::ids::{NamespaceId, TableId};
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::{FakeTserverProxy, TserverDescriptor};

    fn state_with_one_tserver() -> (Arc<MasterState>, TserverId) {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
        let id = TserverId::generate();
        state.tservers.upsert(TserverDescriptor {
            id,
            rpc_addr: "10.0.0.1:9100".into(),
            cloud_info: CloudInfo { cloud: "c".into(), region: "r".into(), zone: "z".into() },
            last_heartbeat_ms: 0,
            is_blacklisted: false,
            is_leader_blacklisted: false,
            recent_replica_creations: 0,
        });
        (state, id)
    }

    fn table_with_tablet(state: &Arc<MasterState>, tserver: TserverId) -> (Arc<TableInfo>, Arc<TabletInfo>) {
        let table_id = TableId::generate();
        let metadata = TableMetadata {
            name: "t".into(),
            namespace_id: NamespaceId::generate(),
            table_type: TableType::UserTable,
            schema: Schema { columns: vec![], next_column_id: 0 },
            partition_schema: crate::core::entities::types::PartitionSchema {
                kind: crate::core::entities::types::PartitionSchemaKind::Single,
                hash_column_ids: vec![],
            },
            replication_info: Some(ReplicationInfo::simple(1)),
            tablespace_id: None,
            state: TableState::Running,
            hide_state: HideState::Visible,
            version: 0,
            indexes: vec![],
            index_info: None,
            fully_applied_schema: None,
            colocated: false,
            is_pg_shared_table: false,
            partition_list_version: 0,
            wal_retention_secs: 0,
            retain_delete_markers: false,
            tablegroup_id: None,
            pending_transaction_id: None,
            create_table_error: None,
        };
        let table = Arc::new(TableInfo::new(table_id, metadata));

        let mut tablet_metadata = TabletMetadata::new(table_id, PartitionKeyRange::full_range());
        tablet_metadata.state = TabletState::Creating;
        let mut replicas = crate::core::entities::types::ReplicaMap::new();
        replicas.insert(
            tserver,
            Replica {
                role: ReplicaRole::Follower,
                member_type: MemberType::Voter,
                state: ReplicaState::Starting,
                fs_data_dir: String::new(),
                drive_info: None,
                time_updated_ms: 0,
                should_disable_lb_move: false,
            },
        );
        tablet_metadata.replica_locations = replicas;
        let tablet = Arc::new(TabletInfo::new(TabletId::generate(), tablet_metadata, 0));
        table.add_tablet(tablet.clone());

        {
            let mut maps = state.catalog.lock();
            maps.tables_by_id.insert(table_id, table.clone());
            maps.tablets_by_id.insert(tablet.id, tablet.clone());
        }

        (table, tablet)
    }

    #[tokio::test]
    async fn unknown_tablet_is_dropped_without_error() {
        let (state, tserver) = state_with_one_tserver();
        let report = TabletReport {
            tserver,
            is_incremental: true,
            updated_tablets: vec![ReportedTablet {
                tablet_id: TabletId::generate(),
                reported_state: TabletState::Running,
                schema_version: 0,
                committed_consensus_state: None,
                reported_visible: true,
                on_disk_size_bytes: 0,
            }],
            remaining_tablet_count: 0,
        };
        let updates = process_tablet_report(&state, report).await.unwrap();
        assert!(updates.processed_tablet_ids.is_empty());
        assert!(!updates.processing_truncated);
    }

    #[tokio::test]
    async fn committed_consensus_state_promotes_tablet_to_running() {
        let (state, tserver) = state_with_one_tserver();
        let (table, tablet) = table_with_tablet(&state, tserver);

        let cstate = ConsensusState { current_term: 1, config: RaftConfig { opid_index: 1, peers: vec![tserver] }, leader_uuid: Some(tserver) };
        let report = TabletReport {
            tserver,
            is_incremental: true,
            updated_tablets: vec![ReportedTablet {
                tablet_id: tablet.id,
                reported_state: TabletState::Running,
                schema_version: 0,
                committed_consensus_state: Some(cstate),
                reported_visible: true,
                on_disk_size_bytes: 0,
            }],
            remaining_tablet_count: 0,
        };

        let updates = process_tablet_report(&state, report).await.unwrap();
        assert_eq!(updates.processed_tablet_ids, vec![tablet.id]);
        assert_eq!(tablet.metadata().read().state, TabletState::Running);
        assert_eq!(tablet.get_leader(), Some(tserver));
        let _ = table;
    }

    #[tokio::test]
    async fn deleted_tablet_is_reported_without_mutation() {
        let (state, tserver) = state_with_one_tserver();
        let (_table, tablet) = table_with_tablet(&state, tserver);
        {
            let mut guard = tablet.metadata().start_mutation().await;
            guard.dirty.state = TabletState::Deleted;
            guard.commit();
        }

        let report = TabletReport {
            tserver,
            is_incremental: true,
            updated_tablets: vec![ReportedTablet {
                tablet_id: tablet.id,
                reported_state: TabletState::Running,
                schema_version: 0,
                committed_consensus_state: None,
                reported_visible: true,
                on_disk_size_bytes: 0,
            }],
            remaining_tablet_count: 0,
        };

        let updates = process_tablet_report(&state, report).await.unwrap();
        assert_eq!(updates.processed_tablet_ids, vec![tablet.id]);
        assert_eq!(tablet.metadata().read().state, TabletState::Deleted);
    }
}
