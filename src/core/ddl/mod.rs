// src/core/ddl/mod.rs

//! The DDL engine (spec.md §4.5, C5): the public, lock-then-mutate-then-persist
//! operations that create, alter, and delete every entity kind. Grounded on
//! the teacher's cluster-reshard command shape (`core/commands/cluster/
//! {addslots,setslot,reshard}.rs`): validate under a lock, stage a CoW draft,
//! persist, commit, then fan out async follow-up work.

pub mod backfill;
pub mod namespace;
pub mod table;
pub mod tablegroup;
pub mod udtype;
