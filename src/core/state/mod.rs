// src/core/state/mod.rs

//! Defines the central `MasterState` struct: the single shared handle passed
//! to every RPC handler, background task, and async task in the process.

pub mod catalog_maps;
pub mod core;

pub use catalog_maps::CatalogMaps;
pub use core::{LifecycleState, MasterState, NO_LEADER_READY_TERM};
