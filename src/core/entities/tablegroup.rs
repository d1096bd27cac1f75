// src/core/entities/tablegroup.rs

use serde::{Deserialize, Serialize};

use super::metadata_state::MetadataState;
use crate::core::ids::{NamespaceId, TableId, TabletId, TablegroupId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablegroupMetadata {
    pub namespace_id: NamespaceId,
    pub child_table_ids: Vec<TableId>,
    pub parent_tablet_id: TabletId,
}

pub struct TablegroupInfo {
    pub id: TablegroupId,
    metadata: MetadataState<TablegroupMetadata>,
}

impl TablegroupInfo {
    pub fn new(id: TablegroupId, metadata: TablegroupMetadata) -> Self {
        Self {
            id,
            metadata: MetadataState::new(metadata),
        }
    }

    pub fn metadata(&self) -> &MetadataState<TablegroupMetadata> {
        &self.metadata
    }
}
