// src/config.rs

//! Loads and validates `MasterConfig` from a TOML file, mirroring the
//! teacher's `RawConfig` → `Config` resolution shape (SPEC_FULL.md §A.3).

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// The fully-resolved, validated runtime configuration for a catalog-manager
/// process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MasterConfig {
    #[serde(default = "default_rpc_bind_addr")]
    pub rpc_bind_addr: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_heartbeat_deadline_ms")]
    pub heartbeat_deadline_ms: u64,
    #[serde(default = "default_heartbeat_safe_deadline_fraction")]
    pub heartbeat_safe_deadline_fraction: f64,

    #[serde(default = "default_leader_catchup_timeout_ms")]
    pub leader_catchup_timeout_ms: u64,
    #[serde(default = "default_leader_election_backoff_ms")]
    pub leader_election_backoff_ms: u64,

    #[serde(default = "default_tablet_creation_timeout_ms")]
    pub tablet_creation_timeout_ms: u64,
    #[serde(default = "default_assignment_pass_interval_ms")]
    pub assignment_pass_interval_ms: u64,

    #[serde(default = "default_num_tablets_per_table")]
    pub default_num_tablets_per_table: usize,
    #[serde(default = "default_shards_per_tserver")]
    pub default_shards_per_tserver: usize,

    #[serde(default = "default_replication_factor")]
    pub default_replication_factor: usize,
    #[serde(default = "default_max_tablets_per_table")]
    pub max_tablets_per_table: usize,
    #[serde(default = "default_tablet_split_limit_per_table")]
    pub tablet_split_limit_per_table: usize,

    #[serde(default = "default_split_low_phase_tablet_threshold")]
    pub split_low_phase_tablet_threshold: usize,
    #[serde(default = "default_split_high_phase_tablet_threshold")]
    pub split_high_phase_tablet_threshold: usize,
    #[serde(default = "default_split_low_size_threshold_bytes")]
    pub split_low_size_threshold_bytes: u64,
    #[serde(default = "default_split_high_size_threshold_bytes")]
    pub split_high_size_threshold_bytes: u64,
    #[serde(default = "default_split_force_size_threshold_bytes")]
    pub split_force_size_threshold_bytes: u64,
    #[serde(default)]
    pub enable_tablet_split_of_pitr_tables: bool,
    #[serde(default)]
    pub enable_tablet_split_of_xcluster_tables: bool,

    #[serde(default = "default_async_task_max_retries")]
    pub async_task_max_retries: u32,
    #[serde(default = "default_async_task_initial_backoff_ms")]
    pub async_task_initial_backoff_ms: u64,
    #[serde(default = "default_async_task_max_backoff_ms")]
    pub async_task_max_backoff_ms: u64,

    #[serde(default = "default_tablespace_refresh_interval_ms")]
    pub tablespace_refresh_interval_ms: u64,
    #[serde(default = "default_partitions_rebuild_interval_ms")]
    pub partitions_rebuild_interval_ms: u64,
    #[serde(default = "default_deleted_table_gc_interval_ms")]
    pub deleted_table_gc_interval_ms: u64,
    #[serde(default = "default_leader_affinity_check_interval_ms")]
    pub leader_affinity_check_interval_ms: u64,

    /// This master's own placement, set at process startup the same way a
    /// tserver's is (SPEC_FULL.md §A.3). Checked against the cluster config's
    /// `replication_info.affinitized_leaders` by the leader-affinity
    /// background task (spec.md §4.10); no master-peer consensus group is
    /// modeled here, so a required step-down is logged rather than issued.
    #[serde(default = "default_placement_cloud")]
    pub placement_cloud: String,
    #[serde(default = "default_placement_region")]
    pub placement_region: String,
    #[serde(default = "default_placement_zone")]
    pub placement_zone: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_rpc_bind_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_rpc_port() -> u16 {
    7100
}
fn default_metrics_port() -> u16 {
    9100
}
fn default_heartbeat_interval_ms() -> u64 {
    1000
}
fn default_heartbeat_deadline_ms() -> u64 {
    15_000
}
fn default_heartbeat_safe_deadline_fraction() -> f64 {
    0.5
}
fn default_leader_catchup_timeout_ms() -> u64 {
    30_000
}
fn default_leader_election_backoff_ms() -> u64 {
    500
}
fn default_tablet_creation_timeout_ms() -> u64 {
    20_000
}
fn default_assignment_pass_interval_ms() -> u64 {
    2_000
}
fn default_num_tablets_per_table() -> usize {
    8
}
fn default_shards_per_tserver() -> usize {
    2
}
fn default_replication_factor() -> usize {
    3
}
fn default_max_tablets_per_table() -> usize {
    256
}
fn default_tablet_split_limit_per_table() -> usize {
    2048
}
fn default_split_low_phase_tablet_threshold() -> usize {
    24
}
fn default_split_high_phase_tablet_threshold() -> usize {
    96
}
fn default_split_low_size_threshold_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_split_high_size_threshold_bytes() -> u64 {
    10 * 1024 * 1024 * 1024
}
fn default_split_force_size_threshold_bytes() -> u64 {
    100 * 1024 * 1024 * 1024
}
fn default_async_task_max_retries() -> u32 {
    20
}
fn default_async_task_initial_backoff_ms() -> u64 {
    100
}
fn default_async_task_max_backoff_ms() -> u64 {
    10_000
}
fn default_tablespace_refresh_interval_ms() -> u64 {
    30_000
}
fn default_partitions_rebuild_interval_ms() -> u64 {
    60_000
}
fn default_deleted_table_gc_interval_ms() -> u64 {
    60_000
}
fn default_leader_affinity_check_interval_ms() -> u64 {
    15_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_placement_cloud() -> String {
    "cloud1".to_string()
}
fn default_placement_region() -> String {
    "datacenter1".to_string()
}
fn default_placement_zone() -> String {
    "rack1".to_string()
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            rpc_bind_addr: default_rpc_bind_addr(),
            rpc_port: default_rpc_port(),
            metrics_port: default_metrics_port(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_deadline_ms: default_heartbeat_deadline_ms(),
            heartbeat_safe_deadline_fraction: default_heartbeat_safe_deadline_fraction(),
            leader_catchup_timeout_ms: default_leader_catchup_timeout_ms(),
            leader_election_backoff_ms: default_leader_election_backoff_ms(),
            tablet_creation_timeout_ms: default_tablet_creation_timeout_ms(),
            assignment_pass_interval_ms: default_assignment_pass_interval_ms(),
            default_num_tablets_per_table: default_num_tablets_per_table(),
            default_shards_per_tserver: default_shards_per_tserver(),
            default_replication_factor: default_replication_factor(),
            max_tablets_per_table: default_max_tablets_per_table(),
            tablet_split_limit_per_table: default_tablet_split_limit_per_table(),
            split_low_phase_tablet_threshold: default_split_low_phase_tablet_threshold(),
            split_high_phase_tablet_threshold: default_split_high_phase_tablet_threshold(),
            split_low_size_threshold_bytes: default_split_low_size_threshold_bytes(),
            split_high_size_threshold_bytes: default_split_high_size_threshold_bytes(),
            split_force_size_threshold_bytes: default_split_force_size_threshold_bytes(),
            enable_tablet_split_of_pitr_tables: false,
            enable_tablet_split_of_xcluster_tables: false,
            async_task_max_retries: default_async_task_max_retries(),
            async_task_initial_backoff_ms: default_async_task_initial_backoff_ms(),
            async_task_max_backoff_ms: default_async_task_max_backoff_ms(),
            tablespace_refresh_interval_ms: default_tablespace_refresh_interval_ms(),
            partitions_rebuild_interval_ms: default_partitions_rebuild_interval_ms(),
            deleted_table_gc_interval_ms: default_deleted_table_gc_interval_ms(),
            leader_affinity_check_interval_ms: default_leader_affinity_check_interval_ms(),
            placement_cloud: default_placement_cloud(),
            placement_region: default_placement_region(),
            placement_zone: default_placement_zone(),
            log_level: default_log_level(),
        }
    }
}

impl MasterConfig {
    /// Loads configuration from a TOML file via the `config` crate, layering
    /// file values over the struct-level defaults, then validates it.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()
            .with_context(|| format!("failed to build config sources from '{path}'"))?;

        let cfg: MasterConfig = settings
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration from '{path}'"))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.rpc_port == 0 {
            return Err(anyhow!("rpc_port cannot be 0"));
        }
        if self.metrics_port == 0 {
            return Err(anyhow!("metrics_port cannot be 0"));
        }
        if self.metrics_port == self.rpc_port {
            return Err(anyhow!("metrics_port cannot be the same as rpc_port"));
        }
        if self.rpc_bind_addr.trim().is_empty() {
            return Err(anyhow!("rpc_bind_addr cannot be empty"));
        }
        if self.default_replication_factor == 0 {
            return Err(anyhow!("default_replication_factor cannot be 0"));
        }
        if self.default_replication_factor % 2 == 0 {
            tracing::warn!(
                replication_factor = self.default_replication_factor,
                "even replication factor configured; odd is recommended for quorum"
            );
        }
        if self.heartbeat_safe_deadline_fraction <= 0.0 || self.heartbeat_safe_deadline_fraction > 1.0 {
            return Err(anyhow!("heartbeat_safe_deadline_fraction must be in (0, 1]"));
        }
        if self.split_low_phase_tablet_threshold > self.split_high_phase_tablet_threshold {
            return Err(anyhow!(
                "split_low_phase_tablet_threshold cannot exceed split_high_phase_tablet_threshold"
            ));
        }
        if self.split_low_size_threshold_bytes > self.split_high_size_threshold_bytes {
            return Err(anyhow!(
                "split_low_size_threshold_bytes cannot exceed split_high_size_threshold_bytes"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MasterConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_equal_ports() {
        let mut cfg = MasterConfig::default();
        cfg.metrics_port = cfg.rpc_port;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_safe_deadline_fraction() {
        let mut cfg = MasterConfig::default();
        cfg.heartbeat_safe_deadline_fraction = 1.5;
        assert!(cfg.validate().is_err());
    }
}
