// src/core/entities/mod.rs

//! In-memory entity objects (spec.md §3, §4.1, component C1): `TableInfo`,
//! `TabletInfo`, `NamespaceInfo`, `UDTypeInfo`, `ClusterConfig`, each
//! wrapping a copy-on-write `MetadataState<T>` (`metadata_state.rs`).

pub mod cluster_config;
pub mod metadata_state;
pub mod namespace;
pub mod table;
pub mod tablegroup;
pub mod tablet;
pub mod types;
pub mod udtype;

pub use cluster_config::{ClusterConfigInfo, ClusterConfigMetadata, YsqlCatalogConfigInfo, YsqlCatalogConfigMetadata};
pub use namespace::{NamespaceInfo, NamespaceMetadata};
pub use table::{TableInfo, TableMetadata};
pub use tablegroup::{TablegroupInfo, TablegroupMetadata};
pub use tablet::{TabletInfo, TabletMetadata};
pub use udtype::{UdTypeInfo, UdTypeMetadata};
