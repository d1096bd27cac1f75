// src/core/entities/namespace.rs

use serde::{Deserialize, Serialize};

use super::metadata_state::MetadataState;
use super::types::{DatabaseType, NamespaceState};
use crate::core::ids::NamespaceId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceMetadata {
    pub name: String,
    pub database_type: DatabaseType,
    pub state: NamespaceState,
    pub colocated: bool,
    pub next_pg_oid: u32,
    /// Set while a DDL transaction that created or deletes this namespace is
    /// still being verified (spec.md §4.5).
    pub pending_transaction_id: Option<uuid::Uuid>,
}

/// `NamespaceInfo` (spec.md §3): id-addressed, CoW-mutated, shared via `Arc`.
pub struct NamespaceInfo {
    pub id: NamespaceId,
    metadata: MetadataState<NamespaceMetadata>,
}

impl NamespaceInfo {
    pub fn new(id: NamespaceId, metadata: NamespaceMetadata) -> Self {
        Self {
            id,
            metadata: MetadataState::new(metadata),
        }
    }

    pub fn metadata(&self) -> &MetadataState<NamespaceMetadata> {
        &self.metadata
    }

    /// Atomically reserve `count` PG oids, clamped at `u32::MAX` on overflow
    /// (spec.md §8 boundary behavior).
    pub fn reserve_pg_oids(begin: u32, count: u32) -> (u32, u32) {
        let end = match begin.checked_add(count) {
            Some(end) if end >= begin => end,
            _ => u32::MAX,
        };
        (begin, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_pg_oids_wraps_to_u32_max() {
        let (begin, end) = NamespaceInfo::reserve_pg_oids(u32::MAX - 2, 10);
        assert_eq!(begin, u32::MAX - 2);
        assert_eq!(end, u32::MAX);
    }

    #[test]
    fn reserve_pg_oids_disjoint_and_contiguous() {
        let (b1, e1) = NamespaceInfo::reserve_pg_oids(100, 5);
        let (b2, e2) = NamespaceInfo::reserve_pg_oids(e1, 5);
        assert_eq!((b1, e1), (100, 105));
        assert_eq!(b2, e1);
        assert_eq!(e2, 110);
    }
}
