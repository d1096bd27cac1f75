// src/core/heartbeat/mod.rs

//! Heartbeat & tablet-report processing (spec.md §4.7, C7): the pipeline that
//! reconciles what a tserver reports it's hosting against catalog state,
//! dispatching follow-up RPCs for anything out of sync. Grounded on the
//! teacher's gossip-driven cluster reconciliation (`core/cluster/gossip.rs`):
//! batched input, sorted processing order, a deadline budget that truncates
//! rather than blocks the caller indefinitely.

pub mod report;

pub use report::{ReportedTablet, TabletReport, TabletReportUpdates, process_tablet_report};
