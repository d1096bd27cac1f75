// src/core/ysql.rs

//! YSQL-side catalog inputs consumed by the tablespace refresh background
//! task (spec.md §4.10). The YSQL query layer itself is out of scope here —
//! consumed as the opaque `YsqlCatalogReader` trait, the same boundary
//! pattern used for `TserverProxy` (`core/tserver.rs`): this crate never
//! parses `pg_tablespace`/`pg_class` itself, only reacts to what the reader
//! returns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::entities::types::PlacementInfo;

/// Reads the subset of the YSQL system catalog the tablespace manager needs:
/// one `PlacementInfo` per tablespace OID with a non-default replica
/// placement option set via `CREATE TABLESPACE ... WITH (replica_placement=...)`.
#[async_trait]
pub trait YsqlCatalogReader: Send + Sync {
    async fn fetch_tablespace_placements(&self) -> anyhow::Result<HashMap<String, PlacementInfo>>;
}

pub type SharedYsqlCatalogReader = Arc<dyn YsqlCatalogReader>;

/// No YSQL layer attached; refresh passes always yield an empty placement
/// set, which the tablespace manager's readers interpret as "use the table's
/// own replication_info".
pub struct NullYsqlCatalogReader;

#[async_trait]
impl YsqlCatalogReader for NullYsqlCatalogReader {
    async fn fetch_tablespace_placements(&self) -> anyhow::Result<HashMap<String, PlacementInfo>> {
        Ok(HashMap::new())
    }
}

/// `YsqlTablespaceManager` (spec.md §4.10, §5 `tablespace_mutex`): an
/// immutable snapshot of tablespace-id to placement, rebuilt wholesale on
/// every refresh and swapped in atomically so readers never observe a
/// partially-updated map.
#[derive(Debug, Clone, Default)]
pub struct YsqlTablespaceManager {
    placements: HashMap<String, PlacementInfo>,
}

impl YsqlTablespaceManager {
    pub fn new(placements: HashMap<String, PlacementInfo>) -> Self {
        Self { placements }
    }

    pub fn get(&self, tablespace_id: &str) -> Option<&PlacementInfo> {
        self.placements.get(tablespace_id)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}
