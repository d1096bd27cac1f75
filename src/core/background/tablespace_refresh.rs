// src/core/background/tablespace_refresh.rs

//! Tablespace refresh (spec.md §4.10): rebuilds the `YsqlTablespaceManager`
//! from the YSQL catalog reader and publishes it under `tablespace_mutex`
//! (spec.md §5) as a single atomic pointer swap, so concurrent readers never
//! see a half-built map. Grounded on the same interval/shutdown loop shape
//! as `deleted_table_gc`, leader-gated for the same reason: non-leaders have
//! nothing authoritative to refresh from.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};

use crate::core::state::MasterState;
use crate::core::ysql::YsqlTablespaceManager;

pub struct TablespaceRefreshTask {
    state: Arc<MasterState>,
}

impl TablespaceRefreshTask {
    pub fn new(state: Arc<MasterState>) -> Self {
        Self { state }
    }

    async fn refresh_once(&self) {
        match self.state.ysql_catalog_reader.fetch_tablespace_placements().await {
            Ok(placements) => {
                let count = placements.len();
                let manager = Arc::new(YsqlTablespaceManager::new(placements));
                *self.state.tablespace_manager.write() = manager;
                info!(tablespace_count = count, "refreshed tablespace placements");
            }
            Err(err) => {
                error!(error = %err, "failed to fetch tablespace placements from YSQL catalog");
            }
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval_ms = self.state.config.read().await.tablespace_refresh_interval_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.state.is_leader_ready() {
                        continue;
                    }
                    self.refresh_once().await;
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::syscatalog::{InMemorySysCatalogStore, SysCatalogGateway};
    use crate::core::tserver::FakeTserverProxy;

    #[tokio::test]
    async fn refresh_is_noop_without_leader_ready() {
        let gateway = SysCatalogGateway::new(Arc::new(InMemorySysCatalogStore::new()));
        let state = MasterState::new(crate::config::MasterConfig::default(), gateway, Arc::new(FakeTserverProxy));
        let task = TablespaceRefreshTask::new(state.clone());
        // Not leader-ready: refresh_once is never invoked by run(), but
        // calling it directly still exercises the null reader's empty path.
        task.refresh_once().await;
        assert!(state.tablespace_manager.read().is_empty());
    }
}
