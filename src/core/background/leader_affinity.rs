// src/core/background/leader_affinity.rs

//! Leader-affinity step-down (spec.md §4.10): if this process is the
//! sys-catalog leader and its own cloud/region/zone falls outside the
//! cluster's affinitized-leader set, a step-down should move sys-catalog
//! leadership to a master peer that is inside it.
//!
//! This catalog manager doesn't model a master-peer consensus group — every
//! other background task and RPC here treats `MasterState` as the only
//! master process, with no registry of sibling masters or an RPC to issue a
//! step-down to one. So this check runs the full decision (is this process
//! misplaced relative to the affinitized set?) but can only log the
//! would-be step-down rather than carry it out. See DESIGN.md for the scope
//! decision.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::warn;

use crate::core::entities::types::CloudInfo;
use crate::core::state::MasterState;

fn own_placement(cfg: &crate::config::MasterConfig) -> CloudInfo {
    CloudInfo {
        cloud: cfg.placement_cloud.clone(),
        region: cfg.placement_region.clone(),
        zone: cfg.placement_zone.clone(),
    }
}

/// True if `placement` matches at least one affinitized zone. An empty
/// affinity set means no preference is configured, so nothing is ever out
/// of place.
fn is_affinitized(placement: &CloudInfo, affinitized: &[CloudInfo]) -> bool {
    affinitized.is_empty() || affinitized.iter().any(|z| z == placement)
}

pub struct LeaderAffinityTask {
    state: Arc<MasterState>,
}

impl LeaderAffinityTask {
    pub fn new(state: Arc<MasterState>) -> Self {
        Self { state }
    }

    async fn check_once(&self) {
        if !self.state.is_leader_ready() {
            return;
        }
        let cfg = self.state.config.read().await;
        let placement = own_placement(&cfg);
        let affinitized = self.state.cluster_config.metadata().read().replication_info.affinitized_leaders.clone();
        if !is_affinitized(&placement, &affinitized) {
            warn!(
                cloud = %placement.cloud,
                region = %placement.region,
                zone = %placement.zone,
                "sys-catalog leader is outside the affinitized zone set; a step-down is due but no master-peer registry exists to target one"
            );
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval_ms = self.state.config.read().await.leader_affinity_check_interval_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => self.check_once().await,
                _ = shutdown.recv() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_affinity_set_is_always_satisfied() {
        let placement = CloudInfo { cloud: "c".into(), region: "r".into(), zone: "z".into() };
        assert!(is_affinitized(&placement, &[]));
    }

    #[test]
    fn mismatched_zone_is_not_affinitized() {
        let placement = CloudInfo { cloud: "c".into(), region: "r".into(), zone: "z".into() };
        let affinitized = vec![CloudInfo { cloud: "c".into(), region: "r".into(), zone: "other".into() }];
        assert!(!is_affinitized(&placement, &affinitized));
    }

    #[test]
    fn matching_zone_is_affinitized() {
        let placement = CloudInfo { cloud: "c".into(), region: "r".into(), zone: "z".into() };
        let affinitized = vec![CloudInfo { cloud: "c".into(), region: "r".into(), zone: "other".into() }, placement];
        assert!(is_affinitized(&placement, &affinitized));
    }
}
