// src/core/errors.rs

//! Defines the primary error type for the catalog manager.
//!
//! `thiserror` gives us a clean enum-to-message mapping; every DDL, placement,
//! and heartbeat entry point returns `Result<T, CatalogError>` (spec.md §7).

use thiserror::Error;

/// The full error taxonomy from spec.md §7.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("object already present: {name} (existing id {existing_id})")]
    AlreadyPresent { name: String, existing_id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("not the leader for the current term")]
    NotLeader,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("try again: {0}")]
    TryAgain(String),

    #[error("object is in transition: {0}")]
    InTransition(String),

    #[error("namespace not empty: {0}")]
    NamespaceNotEmpty(String),

    #[error("replication factor too high: requested {requested}, available {available}")]
    ReplicationFactorTooHigh { requested: usize, available: usize },

    #[error("too many tablets: requested {requested}, limit {limit}")]
    TooManyTablets { requested: usize, limit: usize },

    #[error("invalid replication info: {0}")]
    InvalidReplicationInfo(String),

    #[error("operation not supported: {0}")]
    NotSupported(String),

    #[error("reached tablet split limit for table: {0}")]
    ReachedSplitLimit(String),

    #[error("split or backfill already in progress: {0}")]
    SplitOrBackfillInProgress(String),

    #[error("metadata corruption detected: {0}")]
    Corruption(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// A short machine-readable code for the RPC error envelope (spec.md §6).
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::NotFound(_) => "NOT_FOUND",
            CatalogError::AlreadyPresent { .. } => "ALREADY_PRESENT",
            CatalogError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CatalogError::InvalidSchema(_) => "INVALID_SCHEMA",
            CatalogError::IllegalState(_) => "ILLEGAL_STATE",
            CatalogError::NotLeader => "NOT_LEADER",
            CatalogError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            CatalogError::TryAgain(_) => "TRY_AGAIN",
            CatalogError::InTransition(_) => "IN_TRANSITION",
            CatalogError::NamespaceNotEmpty(_) => "NAMESPACE_NOT_EMPTY",
            CatalogError::ReplicationFactorTooHigh { .. } => "REPLICATION_FACTOR_TOO_HIGH",
            CatalogError::TooManyTablets { .. } => "TOO_MANY_TABLETS",
            CatalogError::InvalidReplicationInfo(_) => "INVALID_REPLICATION_INFO",
            CatalogError::NotSupported(_) => "NOT_SUPPORTED",
            CatalogError::ReachedSplitLimit(_) => "REACHED_SPLIT_LIMIT",
            CatalogError::SplitOrBackfillInProgress(_) => "SPLIT_OR_BACKFILL_IN_PROGRESS",
            CatalogError::Corruption(_) => "CORRUPTION",
            CatalogError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether this failure is safe for a client to retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::NotLeader
                | CatalogError::ServiceUnavailable(_)
                | CatalogError::TryAgain(_)
        )
    }
}
