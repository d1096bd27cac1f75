// src/core/tasks/framework.rs

//! The async task framework (spec.md §4.8, C8): every outbound RPC to a
//! tserver is an owned, retrying task registered with its owning `TableInfo`
//! so it can be cancelled en masse. Grounded on the teacher's background-task
//! shape (`core/tasks/cache_purger.rs`, `core/tasks/cache_revalidator.rs`):
//! a struct holding shared state plus a `run()` loop selecting between a
//! retry interval and a shutdown signal.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::core::ids::TableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TaskKind {
    CreateReplica,
    DeleteReplica,
    AlterTable,
    AddServer,
    RemoveServer,
    TryStepDown,
    StartElection,
    SplitTablet,
    GetTabletSplitKey,
    AddTableToTablet,
    RemoveTableFromTablet,
    TruncateTablet,
    CopartitionTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    PermanentFailure,
    Cancelled,
}

/// Type-erased handle a `TableInfo` keeps so it can abort/inspect tasks
/// without knowing their concrete RPC payload type.
pub trait TaskHandle: Send + Sync + fmt::Debug {
    fn kind(&self) -> TaskKind;
    fn is_done(&self) -> bool;
    fn cancel(&self);
}

/// Common bookkeeping every concrete task embeds: retry budget, cancellation
/// flag, and completion flag. Concrete tasks (`create_replica`, `split_tablet`,
/// ...) wrap this and supply the RPC body in `Runnable::execute_once`.
pub struct TaskState {
    pub kind: TaskKind,
    pub table_id: TableId,
    cancelled: AtomicBool,
    done: AtomicBool,
    attempts: AtomicU64,
}

impl TaskState {
    pub fn new(kind: TaskKind, table_id: TableId) -> Self {
        Self {
            kind,
            table_id,
            cancelled: AtomicBool::new(false),
            done: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl TaskHandle for TaskState {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl<T: Runnable + fmt::Debug> TaskHandle for T {
    fn kind(&self) -> TaskKind {
        self.state().kind
    }

    fn is_done(&self) -> bool {
        self.state().is_done()
    }

    fn cancel(&self) {
        self.state().cancel()
    }
}

impl fmt::Debug for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskState")
            .field("kind", &self.kind)
            .field("table_id", &self.table_id)
            .field("cancelled", &self.is_cancelled())
            .field("done", &self.is_done())
            .finish()
    }
}

/// A single RPC attempt. `execute_once` returns `Ok(true)` on success,
/// `Ok(false)` to retry, or `Err` for a permanent failure.
#[async_trait::async_trait]
pub trait Runnable: Send + Sync {
    fn state(&self) -> &TaskState;

    async fn execute_once(&self) -> anyhow::Result<bool>;
}

/// Retry policy shared by every task (spec.md §4.8: "bounded exponential
/// backoff until success, permanent failure, cancellation, or the owning
/// table transitions to DELETING").
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Drives a `Runnable` to completion, honoring `RetryPolicy` and a
/// `table_is_deleting` predicate supplied by the caller (checked between
/// attempts, since the framework has no direct dependency on `TableInfo`).
pub async fn run_with_retry<R, F>(task: Arc<R>, policy: RetryPolicy, table_is_deleting: F) -> TaskOutcome
where
    R: Runnable + 'static,
    F: Fn() -> bool,
{
    let mut backoff = policy.initial_backoff;
    for attempt in 0..policy.max_attempts {
        if task.state().is_cancelled() {
            info!(kind = %task.state().kind, "task cancelled before attempt {attempt}");
            task.state().mark_done();
            return TaskOutcome::Cancelled;
        }
        if table_is_deleting() {
            info!(kind = %task.state().kind, "owning table deleting, abandoning task");
            task.state().mark_done();
            return TaskOutcome::Cancelled;
        }
        task.state().attempts.fetch_add(1, Ordering::Relaxed);
        match task.execute_once().await {
            Ok(true) => {
                task.state().mark_done();
                return TaskOutcome::Success;
            }
            Ok(false) => {
                warn!(kind = %task.state().kind, attempt, ?backoff, "task attempt failed, retrying");
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, policy.max_backoff);
            }
            Err(e) => {
                warn!(kind = %task.state().kind, error = %e, "task permanently failed");
                task.state().mark_done();
                return TaskOutcome::PermanentFailure;
            }
        }
    }
    warn!(kind = %task.state().kind, "task exhausted retry budget");
    task.state().mark_done();
    TaskOutcome::PermanentFailure
}
