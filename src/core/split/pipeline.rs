// src/core/split/pipeline.rs

//! `SplitTablet`/`DoSplitTablet` (spec.md §4.9): fetches the midpoint key
//! from the tablet's leader, bisects the parent partition into exactly two
//! children, and persists the split. Grounded on `core::ddl::table`'s
//! table-then-tablet write-lock ordering for mutation and on
//! `core::assignment::pipeline`'s replace-in-place pattern for swapping a
//! tablet out of a table's active set.

use std::sync::Arc;

use tracing::info;

use crate::core::entities::types::TabletState;
use crate::core::entities::{TableInfo, TabletInfo, TabletMetadata};
use crate::core::errors::CatalogError;
use crate::core::ids::TabletId;
use crate::core::state::MasterState;
use crate::core::syscatalog::{EntityRow, EntityType};
use crate::core::tasks::framework::{RetryPolicy, run_with_retry};
use crate::core::tasks::split_tablet::SplitTabletTask;

use super::validate::validate_split_candidate;

const NUM_SPLIT_PARTS: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct SplitOutcome {
    pub parent: TabletId,
    pub children: [TabletId; NUM_SPLIT_PARTS],
}

fn retry_policy(cfg: &crate::config::MasterConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: cfg.async_task_max_retries,
        initial_backoff: std::time::Duration::from_millis(cfg.async_task_initial_backoff_ms),
        max_backoff: std::time::Duration::from_millis(cfg.async_task_max_backoff_ms),
    }
}

fn bisect_partition(
    source: &crate::core::entities::types::PartitionKeyRange,
    partition_key: &[u8],
) -> (crate::core::entities::types::PartitionKeyRange, crate::core::entities::types::PartitionKeyRange) {
    use crate::core::entities::types::PartitionKeyRange;
    let left = PartitionKeyRange { start: source.start.clone(), end: Some(partition_key.to_vec()) };
    let right = PartitionKeyRange { start: partition_key.to_vec(), end: source.end.clone() };
    (left, right)
}

/// `DoSplitTablet` (spec.md §4.9 steps 1-5). Registers two CREATING children
/// for `tablet` at `partition_key` and dispatches `AsyncSplitTablet` to the
/// source leader. Re-dispatch of that RPC on failure is handled entirely by
/// the task framework's own retry loop, so this function runs its
/// registration side effects exactly once per call.
async fn do_split_tablet(
    state: &Arc<MasterState>,
    table: &Arc<TableInfo>,
    tablet: &Arc<TabletInfo>,
    source_leader: crate::core::ids::TserverId,
    encoded_key: Vec<u8>,
    partition_key: Vec<u8>,
) -> Result<SplitOutcome, CatalogError> {
    let cfg = state.config.read().await.clone();
    validate_split_candidate(state, &cfg, table, tablet)?;

    let (parent_meta_snapshot, parent_consensus) = {
        let meta = tablet.metadata().read();
        (meta.clone(), meta.committed_consensus_state.clone())
    };
    let (left_range, right_range) = bisect_partition(&parent_meta_snapshot.partition, &partition_key);

    let mut left_meta = TabletMetadata::new(table.id, left_range);
    left_meta.state = TabletState::Creating;
    left_meta.split_depth = parent_meta_snapshot.split_depth + 1;
    left_meta.split_parent_tablet_id = Some(tablet.id);
    left_meta.committed_consensus_state = parent_consensus.clone();
    left_meta.replica_locations = parent_meta_snapshot.replica_locations.clone();

    let mut right_meta = TabletMetadata::new(table.id, right_range);
    right_meta.state = TabletState::Creating;
    right_meta.split_depth = parent_meta_snapshot.split_depth + 1;
    right_meta.split_parent_tablet_id = Some(tablet.id);
    right_meta.committed_consensus_state = parent_consensus;
    right_meta.replica_locations = parent_meta_snapshot.replica_locations.clone();

    let left = Arc::new(TabletInfo::new(TabletId::generate(), left_meta, 0));
    let right = Arc::new(TabletInfo::new(TabletId::generate(), right_meta, 0));

    let term = state.current_term();
    let mut table_guard = table.metadata().start_mutation().await;
    table_guard.dirty.partition_list_version += 1;

    let mut parent_guard = tablet.metadata().start_mutation().await;
    parent_guard.dirty.state = TabletState::Replaced;
    parent_guard.dirty.split_tablet_ids = vec![left.id, right.id];

    let parent_row = EntityRow::new(EntityType::Tablet, tablet.id.to_string(), &parent_guard.dirty).map_err(|e| CatalogError::Internal(e.to_string()))?;
    let left_row = EntityRow::new(EntityType::Tablet, left.id.to_string(), &*left.metadata().read()).map_err(|e| CatalogError::Internal(e.to_string()))?;
    let right_row = EntityRow::new(EntityType::Tablet, right.id.to_string(), &*right.metadata().read()).map_err(|e| CatalogError::Internal(e.to_string()))?;
    let table_row = EntityRow::new(EntityType::Table, table.id.to_string(), &table_guard.dirty).map_err(|e| CatalogError::Internal(e.to_string()))?;

    state.gateway.upsert(term, term, vec![parent_row, left_row, right_row, table_row]).await?;

    parent_guard.commit();
    table_guard.commit();

    {
        let mut maps = state.catalog.lock();
        maps.tablets_by_id.insert(left.id, left.clone());
        maps.tablets_by_id.insert(right.id, right.clone());
    }
    table.replace_tablet(tablet, left.clone());
    table.add_tablet(right.clone());

    info!(parent = %tablet.id, left = %left.id, right = %right.id, table = %table.id, "split tablet registered");
    let children = [left.id, right.id];

    let policy = retry_policy(&cfg);
    let task = SplitTabletTask::new(table.id, source_leader, tablet.id, children.to_vec(), encoded_key, partition_key, state.tserver_proxy.clone());
    table.add_task(task.clone());
    let table_for_retry = table.clone();
    tokio::spawn(async move {
        run_with_retry(task, policy, || {
            table_for_retry.metadata().read().state == crate::core::entities::types::TableState::Deleting
        })
        .await;
    });

    Ok(SplitOutcome { parent: tablet.id, children })
}

/// `SplitTablet(id)` (spec.md §4.9): fetches the midpoint key from the
/// tablet's current leader and carries the split through to completion.
pub async fn split_tablet(state: &Arc<MasterState>, table: &Arc<TableInfo>, tablet: &Arc<TabletInfo>) -> Result<SplitOutcome, CatalogError> {
    let cfg = state.config.read().await.clone();
    validate_split_candidate(state, &cfg, table, tablet)?;

    let leader = tablet.get_leader().ok_or_else(|| CatalogError::TryAgain(format!("tablet {} has no leader yet", tablet.id)))?;
    let (encoded_key, partition_key) = state
        .tserver_proxy
        .get_tablet_split_key(leader, tablet.id)
        .await
        .map_err(|e| CatalogError::ServiceUnavailable(e.to_string()))?;

    do_split_tablet(state, table, tablet, leader, encoded_key, partition_key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::types::{CloudInfo, ConsensusState, HideState, MemberType, PartitionKeyRange, PartitionSchema, PartitionSchemaKind, RaftConfig, Replica, ReplicaRole, ReplicaState, ReplicationInfo, Schema, TableState, TableType};
    use crate::core::entities::TableMetadata;
    use crate::core::ids::{NamespaceId, TableId, TserverId};
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::{FakeTserverProxy, TserverDescriptor};

    async fn running_table_tablet_with_leader() -> (Arc<MasterState>, Arc<TableInfo>, Arc<TabletInfo>, TserverId) {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
        let leader = TserverId::generate();
        state.tservers.upsert(TserverDescriptor {
            id: leader,
            rpc_addr: "10.0.0.1:9100".into(),
            cloud_info: CloudInfo { cloud: "c".into(), region: "r".into(), zone: "z".into() },
            last_heartbeat_ms: 0,
            is_blacklisted: false,
            is_leader_blacklisted: false,
            recent_replica_creations: 0,
        });

        let table_id = TableId::generate();
        let meta = TableMetadata {
            name: "orders".into(),
            namespace_id: NamespaceId::generate(),
            table_type: TableType::UserTable,
            schema: Schema { columns: vec![], next_column_id: 0 },
            partition_schema: PartitionSchema { kind: PartitionSchemaKind::Hash, hash_column_ids: vec![] },
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
        let table = Arc::new(TableInfo::new(table_id, meta));

        let mut tablet_meta = TabletMetadata::new(table_id, PartitionKeyRange::full_range());
        tablet_meta.state = TabletState::Running;
        let mut replicas = crate::core::entities::types::ReplicaMap::new();
        replicas.insert(
            leader,
            Replica {
                role: ReplicaRole::Leader,
                member_type: MemberType::Voter,
                state: ReplicaState::Running,
                fs_data_dir: String::new(),
                drive_info: None,
                time_updated_ms: 0,
                should_disable_lb_move: false,
            },
        );
        tablet_meta.replica_locations = replicas;
        tablet_meta.committed_consensus_state = Some(ConsensusState { current_term: 1, config: RaftConfig { opid_index: 1, peers: vec![leader] }, leader_uuid: Some(leader) });
        let tablet = Arc::new(TabletInfo::new(TabletId::generate(), tablet_meta, 0));
        table.add_tablet(tablet.clone());

        {
            let mut maps = state.catalog.lock();
            maps.tables_by_id.insert(table_id, table.clone());
            maps.tablets_by_id.insert(tablet.id, tablet.clone());
        }

        (state, table, tablet, leader)
    }

    #[tokio::test]
    async fn split_registers_two_creating_children() {
        let (state, table, tablet, _leader) = running_table_tablet_with_leader().await;
        let outcome = split_tablet(&state, &table, &tablet).await.unwrap();

        assert_eq!(tablet.metadata().read().state, TabletState::Replaced);
        assert_eq!(tablet.metadata().read().split_tablet_ids, vec![outcome.children[0], outcome.children[1]]);
        assert_eq!(table.metadata().read().partition_list_version, 1);

        for child_id in outcome.children {
            let child = state.catalog.lock().tablets_by_id.get(&child_id).cloned().unwrap();
            let meta = child.metadata().read();
            assert_eq!(meta.state, TabletState::Creating);
            assert_eq!(meta.split_parent_tablet_id, Some(tablet.id));
            assert_eq!(meta.split_depth, 1);
        }
    }

    #[tokio::test]
    async fn split_of_already_replaced_tablet_is_rejected() {
        let (state, table, tablet, _leader) = running_table_tablet_with_leader().await;
        split_tablet(&state, &table, &tablet).await.unwrap();
        let err = split_tablet(&state, &table, &tablet).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }
}
