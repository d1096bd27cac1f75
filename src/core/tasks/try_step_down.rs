// src/core/tasks/try_step_down.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncTryStepDown` (spec.md §4.8): asks the current raft leader of
/// `tablet` to step down, optionally hinting which peer should take over.
#[derive(Debug)]
pub struct TryStepDownTask {
    state: TaskState,
    leader_tserver: TserverId,
    tablet: TabletId,
    new_leader_hint: Option<TserverId>,
    proxy: SharedTserverProxy,
}

impl TryStepDownTask {
    pub fn new(
        table_id: TableId,
        leader_tserver: TserverId,
        tablet: TabletId,
        new_leader_hint: Option<TserverId>,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::TryStepDown, table_id),
            leader_tserver,
            tablet,
            new_leader_hint,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for TryStepDownTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .try_step_down(self.leader_tserver, self.tablet, self.new_leader_hint)
            .await?;
        Ok(true)
    }
}
