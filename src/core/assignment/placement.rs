// src/core/assignment/placement.rs

//! `SelectReplicasForTablet` (spec.md §4.6 steps 1-5): resolves the effective
//! replication policy, filters eligible tservers per placement block, and
//! allocates replicas with power-of-two-choices load balancing.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;

use crate::core::entities::types::{
    ConsensusState, PlacementInfo, Replica, ReplicaMap, ReplicaRole, ReplicaState, ReplicationInfo,
};
use crate::core::errors::CatalogError;
use crate::core::ids::TserverId;
use crate::core::state::MasterState;
use crate::core::tserver::TserverDescriptor;

/// Resolves the effective `ReplicationInfo` for a table: its own override, if
/// set, else the cluster-wide default (spec.md §4.6 step 1; tablespace-level
/// overrides are out of scope since `core::ddl::table` doesn't model
/// tablespaces beyond the opaque id field).
pub fn effective_replication_info(state: &Arc<MasterState>, table_override: &Option<ReplicationInfo>) -> ReplicationInfo {
    if let Some(info) = table_override {
        return info.clone();
    }
    let cluster = state.cluster_config.metadata().read();
    ReplicationInfo {
        live_replicas: cluster.replication_info.live_replicas.clone(),
        read_replicas: cluster.replication_info.read_replicas.clone(),
        affinitized_leaders: cluster.replication_info.affinitized_leaders.clone(),
    }
}

fn matches_block(desc: &TserverDescriptor, block_cloud: &crate::core::entities::types::CloudInfo) -> bool {
    desc.cloud_info.cloud == block_cloud.cloud
        && desc.cloud_info.region == block_cloud.region
        && desc.cloud_info.zone == block_cloud.zone
}

/// Counts replicas currently placed on each tserver across every known
/// tablet, the `num_live_replicas` term of spec.md §4.6 step 4. Callers that
/// place many tablets in one pass should compute this once and thread it
/// through rather than calling this per tablet, since it's an O(tablets)
/// scan over the whole catalog.
pub fn live_replica_counts(state: &Arc<MasterState>) -> HashMap<TserverId, usize> {
    let mut counts = HashMap::new();
    for tablet in state.catalog.lock().tablets_by_id.values() {
        for peer in tablet.get_replica_locations().keys() {
            *counts.entry(*peer).or_insert(0usize) += 1;
        }
    }
    counts
}

fn load_score(desc: &TserverDescriptor, live_replica_counts: &HashMap<TserverId, usize>) -> usize {
    live_replica_counts.get(&desc.id).copied().unwrap_or(0) + desc.recent_replica_creations
}

/// Picks `count` distinct tservers from `candidates` via power-of-two
/// choices on `load_score`, skipping ids already in `chosen`.
fn pick_power_of_two(candidates: &[TserverDescriptor], count: usize, chosen: &mut ReplicaMap, live_replica_counts: &HashMap<TserverId, usize>) {
    if candidates.is_empty() {
        return;
    }
    let mut rng = rand::thread_rng();
    let mut picked = 0;
    let mut guard = 0;
    while picked < count && guard < candidates.len() * 8 {
        guard += 1;
        let a = &candidates[rng.gen_range(0..candidates.len())];
        let b = &candidates[rng.gen_range(0..candidates.len())];
        let winner = if load_score(a, live_replica_counts) <= load_score(b, live_replica_counts) { a } else { b };
        if chosen.contains_key(&winner.id) {
            continue;
        }
        chosen.insert(
            winner.id,
            Replica {
                role: ReplicaRole::Follower,
                member_type: crate::core::entities::types::MemberType::Voter,
                state: ReplicaState::Starting,
                fs_data_dir: String::new(),
                drive_info: None,
                time_updated_ms: 0,
                should_disable_lb_move: false,
            },
        );
        picked += 1;
    }
}

pub fn select_replicas_for_tablet(
    state: &Arc<MasterState>,
    placement: &PlacementInfo,
    replica_counts: &HashMap<TserverId, usize>,
) -> Result<(ReplicaMap, ConsensusState), CatalogError> {
    let live: Vec<TserverDescriptor> = state
        .tservers
        .live_servers()
        .into_iter()
        .filter(|d| !d.is_blacklisted)
        .collect();

    if live.len() < placement.num_replicas {
        return Err(CatalogError::ReplicationFactorTooHigh {
            requested: placement.num_replicas,
            available: live.len(),
        });
    }

    let sum_mins: usize = placement.placement_blocks.iter().map(|b| b.min_num_replicas).sum();
    if sum_mins > placement.num_replicas {
        return Err(CatalogError::InvalidReplicationInfo(format!(
            "sum of placement block minimums ({sum_mins}) exceeds num_replicas ({})",
            placement.num_replicas
        )));
    }

    let mut chosen = ReplicaMap::new();
    for block in &placement.placement_blocks {
        let candidates: Vec<TserverDescriptor> = live
            .iter()
            .filter(|d| matches_block(d, &block.cloud_info))
            .cloned()
            .collect();
        if candidates.len() < block.min_num_replicas {
            return Err(CatalogError::InvalidReplicationInfo(format!(
                "placement block {}.{}.{} cannot satisfy minimum of {} replicas ({} candidates)",
                block.cloud_info.cloud, block.cloud_info.region, block.cloud_info.zone, block.min_num_replicas, candidates.len()
            )));
        }
        pick_power_of_two(&candidates, block.min_num_replicas, &mut chosen, replica_counts);
    }

    let remaining = placement.num_replicas.saturating_sub(chosen.len());
    if remaining > 0 {
        pick_power_of_two(&live, remaining, &mut chosen, replica_counts);
    }

    if chosen.len() < placement.num_replicas {
        return Err(CatalogError::ReplicationFactorTooHigh {
            requested: placement.num_replicas,
            available: chosen.len(),
        });
    }

    let peers: Vec<_> = chosen.keys().copied().collect();
    let consensus = ConsensusState::empty(0, peers);
    Ok((chosen, consensus))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::types::CloudInfo;
    use crate::core::ids::TserverId;
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::FakeTserverProxy;

    fn state_with_tservers(n: usize) -> Arc<MasterState> {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
        for i in 0..n {
            state.tservers.upsert(TserverDescriptor {
                id: TserverId::generate(),
                rpc_addr: format!("10.0.0.{i}:9100"),
                cloud_info: CloudInfo {
                    cloud: "cloud1".into(),
                    region: "region1".into(),
                    zone: "zone1".into(),
                },
                last_heartbeat_ms: 0,
                is_blacklisted: false,
                is_leader_blacklisted: false,
                recent_replica_creations: 0,
            });
        }
        state
    }

    #[test]
    fn selects_exactly_num_replicas_distinct_tservers() {
        let state = state_with_tservers(5);
        let placement = PlacementInfo::simple(3);
        let (replicas, consensus) = select_replicas_for_tablet(&state, &placement, &live_replica_counts(&state)).unwrap();
        assert_eq!(replicas.len(), 3);
        assert_eq!(consensus.config.peers.len(), 3);
    }

    #[test]
    fn rejects_when_too_few_live_tservers() {
        let state = state_with_tservers(2);
        let placement = PlacementInfo::simple(3);
        let err = select_replicas_for_tablet(&state, &placement, &live_replica_counts(&state)).unwrap_err();
        assert!(matches!(err, CatalogError::ReplicationFactorTooHigh { .. }));
    }

    #[test]
    fn ignores_blacklisted_tservers() {
        let state = state_with_tservers(3);
        let blacklisted_id = state.tservers.live_servers()[0].id;
        let mut desc = state.tservers.get(&blacklisted_id).unwrap();
        desc.is_blacklisted = true;
        state.tservers.upsert(desc);

        let placement = PlacementInfo::simple(3);
        let err = select_replicas_for_tablet(&state, &placement, &live_replica_counts(&state)).unwrap_err();
        assert!(matches!(err, CatalogError::ReplicationFactorTooHigh { .. }));
    }
}
