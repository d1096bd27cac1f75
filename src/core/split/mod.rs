// src/core/split/mod.rs

//! Tablet split pipeline (spec.md §4.9, C9): decides which tablets are
//! eligible to split, then carries a validated candidate through the
//! two-child split sequence. Grounded on the teacher's periodic
//! reconciliation cron (`core/cluster/gossip.rs`) for the scan/act shape, and
//! on `core::ddl::table`'s table-then-tablet write-lock ordering for the
//! mutation itself.

pub mod pipeline;
pub mod validate;

pub use pipeline::{SplitOutcome, split_tablet};
pub use validate::{should_split_valid_candidate, validate_split_candidate};
