// src/core/entities/metadata_state.rs

//! The copy-on-write mutation discipline shared by every entity object
//! (spec.md §3, §4.1): a committed snapshot plus an optional dirty draft,
//! mutated under *start-mutation → modify dirty → persist → commit | abort*.
//!
//! This generalizes the teacher's per-shard `MutexGuard`-based locking
//! (`core/database/locking.rs`) from "lock a shard of keys" to "lock one
//! entity's metadata", and its checkout/commit persistence flow
//! (`server/initialization.rs`) from "load once at startup" to "every
//! mutation, gated by a write lock that blocks concurrent commits".

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

/// Holds the committed value plus machinery for staging and publishing a new
/// one. `T` is the plain-old-data metadata payload for an entity (e.g.
/// `TableMetadata`).
pub struct MetadataState<T: Clone + Send + Sync + 'static> {
    committed: RwLock<Arc<T>>,
    /// Serializes writers; held for the lifetime of a `WriteGuard`. Using an
    /// async mutex lets a mutation `.await` the syscatalog upsert while still
    /// holding the lock, matching "writers a write-lock blocking commits".
    write_lock: Mutex<()>,
}

impl<T: Clone + Send + Sync + 'static> MetadataState<T> {
    pub fn new(initial: T) -> Self {
        Self {
            committed: RwLock::new(Arc::new(initial)),
            write_lock: Mutex::new(()),
        }
    }

    /// `LockForRead`: returns the committed snapshot. Readers never block on
    /// a writer that hasn't committed yet.
    pub fn read(&self) -> Arc<T> {
        self.committed.read().clone()
    }

    /// `LockForWrite`: acquires the write lock and seeds a dirty draft from
    /// the currently committed value. Fails only on resource exhaustion, per
    /// §4.1 ("`LockForWrite` may fail only via resource exhaustion").
    pub async fn start_mutation(&self) -> WriteGuard<'_, T> {
        let guard = self.write_lock.lock().await;
        let dirty = (**self.committed.read()).clone();
        WriteGuard {
            _guard: guard,
            committed: &self.committed,
            dirty,
            resolved: false,
        }
    }
}

/// An in-flight mutation. Must be resolved with `commit` or `abort`;
/// dropping it without resolving aborts implicitly (no partial publish).
pub struct WriteGuard<'a, T: Clone + Send + Sync + 'static> {
    _guard: MutexGuard<'a, ()>,
    committed: &'a RwLock<Arc<T>>,
    pub dirty: T,
    resolved: bool,
}

impl<'a, T: Clone + Send + Sync + 'static> WriteGuard<'a, T> {
    /// Publishes the dirty draft as the new committed snapshot. Persistence
    /// (syscatalog upsert) must have already succeeded by the time this is
    /// called — "commit never fails" (§4.1) because it is purely in-memory.
    pub fn commit(mut self) {
        *self.committed.write() = Arc::new(self.dirty.clone());
        self.resolved = true;
    }

    /// Discards the dirty draft, leaving the committed snapshot untouched.
    pub fn abort(mut self) {
        self.resolved = true;
    }
}

impl<'a, T: Clone + Send + Sync + 'static> Drop for WriteGuard<'a, T> {
    fn drop(&mut self) {
        if !self.resolved {
            // Mirrors an explicit `abort_mutation()`: never publish a draft
            // whose caller didn't reach a commit/abort decision.
            self.resolved = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    struct Payload(i32);

    #[tokio::test]
    async fn commit_publishes_dirty_value() {
        let state = MetadataState::new(Payload(1));
        let mut guard = state.start_mutation().await;
        guard.dirty.0 = 2;
        guard.commit();
        assert_eq!(state.read().0, 2);
    }

    #[tokio::test]
    async fn abort_preserves_committed_value() {
        let state = MetadataState::new(Payload(1));
        let mut guard = state.start_mutation().await;
        guard.dirty.0 = 99;
        guard.abort();
        assert_eq!(state.read().0, 1);
    }

    #[tokio::test]
    async fn drop_without_resolution_preserves_committed_value() {
        let state = MetadataState::new(Payload(5));
        {
            let mut guard = state.start_mutation().await;
            guard.dirty.0 = 123;
            // Dropped without commit/abort.
        }
        assert_eq!(state.read().0, 5);
    }
}
