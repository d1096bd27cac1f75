// src/core/background/mod.rs

//! Periodic maintenance tasks (spec.md §4.10, C10) that run outside the RPC
//! request path: the deleted-table sweep, tablespace refresh, system.partitions
//! rebuild, and leader-affinity check. Each is its own `struct` with a
//! `run(shutdown_rx)` loop, grounded on the teacher's interval/shutdown
//! maintenance tasks (`core/storage/ttl.rs`, `core/pubsub/channel_purger.rs`)
//! so the shape matches however many of these eventually get spawned from
//! `server::spawner`.

pub mod deleted_table_gc;
pub mod leader_affinity;
pub mod partitions_rebuild;
pub mod tablespace_refresh;

pub use deleted_table_gc::DeletedTableGcTask;
pub use leader_affinity::LeaderAffinityTask;
pub use partitions_rebuild::{PartitionRow, PartitionsRebuildTask, SystemPartitionsSnapshot};
pub use tablespace_refresh::TablespaceRefreshTask;
