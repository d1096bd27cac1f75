// src/core/split/validate.rs

//! `ValidateSplitCandidate` and `ShouldSplitValidCandidate` (spec.md §4.9).

use std::sync::Arc;

use crate::core::entities::types::{DatabaseType, TableType, TabletState};
use crate::core::entities::{TableInfo, TabletInfo};
use crate::core::errors::CatalogError;
use crate::core::state::MasterState;

/// Transaction-status tables aren't modeled as a distinct `TableType`
/// variant; they're plain system tables named by convention.
fn is_transaction_status_table(table: &TableInfo) -> bool {
    let meta = table.metadata().read();
    meta.table_type == TableType::SystemTable && meta.name.to_lowercase().contains("transactions")
}

fn is_yedis_table(state: &Arc<MasterState>, table: &TableInfo) -> bool {
    let namespace_id = table.metadata().read().namespace_id;
    state
        .catalog
        .lock()
        .namespaces_by_id
        .get(&namespace_id)
        .map(|ns| ns.metadata().read().database_type == DatabaseType::Redis)
        .unwrap_or(false)
}

/// Rejects tablets ineligible for splitting (spec.md §4.9). `table` is the
/// tablet's owning table.
pub fn validate_split_candidate(
    state: &Arc<MasterState>,
    cfg: &crate::config::MasterConfig,
    table: &Arc<TableInfo>,
    tablet: &Arc<TabletInfo>,
) -> Result<(), CatalogError> {
    let tablet_meta = tablet.metadata().read();
    if tablet_meta.state != TabletState::Running {
        return Err(CatalogError::InvalidArgument(format!("tablet {} is not RUNNING", tablet.id)));
    }
    if !tablet_meta.retained_by_snapshot_schedules.is_empty() && !cfg.enable_tablet_split_of_pitr_tables {
        return Err(CatalogError::NotSupported(format!("tablet {} is covered by a PITR snapshot schedule", tablet.id)));
    }
    drop(tablet_meta);

    if is_transaction_status_table(table) {
        return Err(CatalogError::NotSupported(format!("table {} is a transaction status table", table.id)));
    }

    let table_meta = table.metadata().read();
    if table_meta.colocated {
        return Err(CatalogError::NotSupported(format!("table {} is colocated", table.id)));
    }
    drop(table_meta);

    if is_yedis_table(state, table) {
        return Err(CatalogError::NotSupported(format!("table {} belongs to a YEDIS namespace", table.id)));
    }

    if table.num_partitions() >= cfg.tablet_split_limit_per_table {
        return Err(CatalogError::ReachedSplitLimit(format!("table {} already has {} tablets", table.id, table.num_partitions())));
    }

    if table.is_backfilling() {
        return Err(CatalogError::SplitOrBackfillInProgress(format!("table {} is backfilling", table.id)));
    }

    Ok(())
}

/// Phase-based size threshold decision (spec.md §4.9). `tablets_on_node` is
/// the number of tablets currently hosted by the node holding this tablet's
/// leader replica, used to pick which threshold phase applies.
pub fn should_split_valid_candidate(cfg: &crate::config::MasterConfig, tablet: &Arc<TabletInfo>, tablets_on_node: usize) -> bool {
    let meta = tablet.metadata().read();
    if meta.may_have_orphaned_post_split_data {
        return false;
    }
    let size = meta.on_disk_size_bytes;
    drop(meta);

    let threshold = if tablets_on_node < cfg.split_low_phase_tablet_threshold {
        cfg.split_low_size_threshold_bytes
    } else if tablets_on_node < cfg.split_high_phase_tablet_threshold {
        cfg.split_high_size_threshold_bytes
    } else {
        cfg.split_force_size_threshold_bytes
    };

    size > threshold
}
