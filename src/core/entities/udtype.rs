// src/core/entities/udtype.rs

use serde::{Deserialize, Serialize};

use super::metadata_state::MetadataState;
use crate::core::ids::{NamespaceId, UdTypeId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdTypeMetadata {
    pub name: String,
    pub namespace_id: NamespaceId,
    pub field_names: Vec<String>,
    /// Either a primitive type name or `udt:<id>` referencing another
    /// user-defined type (spec.md §3).
    pub field_types: Vec<String>,
}

impl UdTypeMetadata {
    pub fn references(&self, other: UdTypeId) -> bool {
        let needle = format!("udt:{other}");
        self.field_types.iter().any(|t| *t == needle)
    }
}

pub struct UdTypeInfo {
    pub id: UdTypeId,
    metadata: MetadataState<UdTypeMetadata>,
}

impl UdTypeInfo {
    pub fn new(id: UdTypeId, metadata: UdTypeMetadata) -> Self {
        Self {
            id,
            metadata: MetadataState::new(metadata),
        }
    }

    pub fn metadata(&self) -> &MetadataState<UdTypeMetadata> {
        &self.metadata
    }
}
