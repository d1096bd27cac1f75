// src/core/syscatalog/mod.rs

//! The SysCatalog gateway (spec.md §4.2, C2): term-qualified Upsert/Delete/
//! Visit over the replicated metadata tablet. The Raft/consensus library and
//! on-disk tablet engine are out of scope (spec.md §1) — they are consumed
//! here as the opaque `SysCatalogStore` trait, the same boundary the teacher
//! draws around its AOF/SPLDB persistence backends
//! (`core/persistence/{aof_writer,spldb}.rs`): the gateway only knows it can
//! durably upsert/delete/visit rows, not how.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::errors::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum_macros::Display, Serialize, Deserialize)]
pub enum EntityType {
    Role,
    SysConfig,
    Namespace,
    Table,
    Tablet,
    UdType,
    ClusterConfig,
    YsqlCatalogConfig,
    Tablegroup,
    RedisConfig,
    DdlLogEntry,
}

/// One persisted row: `{entity_type, id, bytes(payload)}` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRow {
    pub entity_type: EntityType,
    pub id: String,
    pub payload: Vec<u8>,
}

impl EntityRow {
    pub fn new<T: Serialize>(entity_type: EntityType, id: impl Into<String>, value: &T) -> anyhow::Result<Self> {
        Ok(Self {
            entity_type,
            id: id.into(),
            payload: serde_json::to_vec(value)?,
        })
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Opaque replicated key/value store consumed by the gateway. A real
/// deployment backs this with the Raft-replicated metadata tablet; tests and
/// single-process demos use `InMemorySysCatalogStore`.
#[async_trait::async_trait]
pub trait SysCatalogStore: Send + Sync {
    /// Durable once this returns: the row is committed across a quorum
    /// (spec.md §4.2 ordering guarantee).
    async fn upsert(&self, rows: Vec<EntityRow>) -> anyhow::Result<()>;
    async fn delete(&self, entity_type: EntityType, id: &str) -> anyhow::Result<()>;
    async fn visit(&self, entity_type: EntityType) -> anyhow::Result<Vec<EntityRow>>;
}

pub struct InMemorySysCatalogStore {
    rows: RwLock<BTreeMap<(EntityType, String), EntityRow>>,
}

impl InMemorySysCatalogStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemorySysCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SysCatalogStore for InMemorySysCatalogStore {
    async fn upsert(&self, rows: Vec<EntityRow>) -> anyhow::Result<()> {
        let mut guard = self.rows.write();
        for row in rows {
            guard.insert((row.entity_type, row.id.clone()), row);
        }
        Ok(())
    }

    async fn delete(&self, entity_type: EntityType, id: &str) -> anyhow::Result<()> {
        self.rows.write().remove(&(entity_type, id.to_string()));
        Ok(())
    }

    async fn visit(&self, entity_type: EntityType) -> anyhow::Result<Vec<EntityRow>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|((t, _), _)| *t == entity_type)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

/// A single DDL-log entry, visited by `FetchDdlLog` (spec.md §4.2, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdlLogEntry {
    pub table_id: String,
    pub action: String,
    pub detail: String,
    pub timestamp_ms: i64,
}

/// Wraps a `SysCatalogStore` with the term-qualification rule (spec.md §4.2):
/// writes fail with `NotLeader` once the caller's term no longer matches the
/// committed leadership term.
pub struct SysCatalogGateway {
    store: Arc<dyn SysCatalogStore>,
}

impl SysCatalogGateway {
    pub fn new(store: Arc<dyn SysCatalogStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, term: i64, current_term: i64, rows: Vec<EntityRow>) -> Result<(), CatalogError> {
        if term != current_term {
            return Err(CatalogError::NotLeader);
        }
        self.store
            .upsert(rows)
            .await
            .map_err(|e| CatalogError::Internal(e.to_string()))
    }

    pub async fn delete(&self, term: i64, current_term: i64, entity_type: EntityType, id: &str) -> Result<(), CatalogError> {
        if term != current_term {
            return Err(CatalogError::NotLeader);
        }
        self.store
            .delete(entity_type, id)
            .await
            .map_err(|e| CatalogError::Internal(e.to_string()))
    }

    pub async fn visit(&self, entity_type: EntityType) -> anyhow::Result<Vec<EntityRow>> {
        self.store.visit(entity_type).await
    }

    pub async fn append_ddl_log(&self, entry: DdlLogEntry) -> anyhow::Result<()> {
        let row = EntityRow::new(EntityType::DdlLogEntry, uuid::Uuid::new_v4().to_string(), &entry)?;
        self.store.upsert(vec![row]).await
    }

    pub async fn fetch_ddl_log(&self) -> anyhow::Result<Vec<DdlLogEntry>> {
        let rows = self.store.visit(EntityType::DdlLogEntry).await?;
        rows.iter().map(|r| r.decode()).collect()
    }
}
