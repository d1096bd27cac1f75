// src/core/metrics.rs

//! Defines and registers Prometheus metrics for the catalog manager
//! (SPEC_FULL.md §A.5). `lazy_static` ensures metrics are registered exactly
//! once for the process lifetime, the same idiom the teacher uses for its
//! own `core::metrics`.

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, GaugeVec, TextEncoder, register_counter_vec, register_gauge,
    register_gauge_vec,
};

lazy_static! {
    /// The term for which this process has finished loading metadata, or -1.
    pub static ref LEADER_READY_TERM: Gauge =
        register_gauge!("catalog_leader_ready_term", "Term for which this master has finished loading metadata, or -1.").unwrap();

    pub static ref TABLES_TOTAL: Gauge =
        register_gauge!("catalog_tables_total", "Total number of tables tracked by the catalog.").unwrap();

    /// Labeled by tablet state (preparing, creating, running, replaced, deleted).
    pub static ref TABLETS_TOTAL: GaugeVec =
        register_gauge_vec!("catalog_tablets_total", "Number of tablets tracked by the catalog, by state.", &["state"]).unwrap();

    pub static ref TSERVERS_REGISTERED: Gauge =
        register_gauge!("catalog_tservers_registered", "Number of tservers currently registered with this master.").unwrap();

    /// Labeled by op (create_table, alter_table, ...) and result (ok, error).
    pub static ref DDL_OPERATIONS_TOTAL: CounterVec =
        register_counter_vec!("catalog_ddl_operations_total", "Total DDL operations processed, by operation and result.", &["op", "result"]).unwrap();

    pub static ref HEARTBEATS_PROCESSED_TOTAL: CounterVec =
        register_counter_vec!("catalog_heartbeats_processed_total", "Total tablet-report heartbeats processed, by result.", &["result"]).unwrap();

    pub static ref HEARTBEATS_TRUNCATED_TOTAL: prometheus::Counter =
        prometheus::register_counter!("catalog_heartbeats_truncated_total", "Total tablet reports truncated at the safe deadline.").unwrap();

    /// Labeled by task kind and outcome (succeeded, failed, cancelled).
    pub static ref ASYNC_TASKS_TOTAL: CounterVec =
        register_counter_vec!("catalog_async_tasks_total", "Total async tasks completed, by kind and outcome.", &["kind", "outcome"]).unwrap();

    pub static ref TABLET_SPLITS_TOTAL: CounterVec =
        register_counter_vec!("catalog_tablet_splits_total", "Total tablet splits attempted, by result.", &["result"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
