// src/core/tasks/split_tablet.rs

use std::sync::Arc;

use crate::core::ids::{TableId, TabletId, TserverId};
use crate::core::tserver::SharedTserverProxy;

use super::framework::{Runnable, TaskKind, TaskState};

/// `AsyncSplitTablet` (spec.md §4.8, §4.9): instructs the raft leader of the
/// parent `tablet` to split into `children`, using the precomputed encoded
/// split key.
#[derive(Debug)]
pub struct SplitTabletTask {
    state: TaskState,
    leader_tserver: TserverId,
    tablet: TabletId,
    children: Vec<TabletId>,
    #[allow(dead_code)]
    split_encoded_key: Vec<u8>,
    #[allow(dead_code)]
    split_partition_key: Vec<u8>,
    proxy: SharedTserverProxy,
}

impl SplitTabletTask {
    pub fn new(
        table_id: TableId,
        leader_tserver: TserverId,
        tablet: TabletId,
        children: Vec<TabletId>,
        split_encoded_key: Vec<u8>,
        split_partition_key: Vec<u8>,
        proxy: SharedTserverProxy,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(TaskKind::SplitTablet, table_id),
            leader_tserver,
            tablet,
            children,
            split_encoded_key,
            split_partition_key,
            proxy,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for SplitTabletTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn execute_once(&self) -> anyhow::Result<bool> {
        self.proxy
            .split_tablet(self.leader_tserver, self.tablet, self.children.clone())
            .await?;
        Ok(true)
    }
}
