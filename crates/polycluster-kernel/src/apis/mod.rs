//! Aggregated-API kernel contract.
//!
//! This module defines the *types and capability traits* shared by the
//! discovery and routing layer.  No concrete implementations live here;
//! those belong in `polycluster-apiserver`.
//!
//! # Architecture mapping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              polycluster-kernel  (this module)              │
//! │  GroupVersionResource / ApiGroup / ApiResource ...          │
//! │  Serializer   CatalogSource   ResourceScheme                │
//! │  StorageFactory / ResourceStorage   RequestInfo             │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │              polycluster-apiserver  (runtime crate)         │
//! │  DiscoveryManager: per-cluster discovery snapshots          │
//! │  RestManager: impl CatalogSource, resource bindings         │
//! │  ResourceHandler / ApiServer (axum)                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod capability;
pub mod error;
pub mod meta;
pub mod object;
pub mod request;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use capability::{
    CatalogSource, ListOptions, ResourceScheme, ResourceStorage, ResourceStorageConfig,
    StorageFactory, StorageScope,
};
pub use error::{ApiError, StorageError};
pub use meta::{
    ApiGroup, ApiGroupList, ApiGroupResources, ApiResource, ApiResourceList, ApiVersions,
    GroupKind, GroupResource, GroupVersion, GroupVersionForDiscovery, GroupVersionKind,
    GroupVersionResource,
};
pub use object::{
    Encoded, Object, SHADOW_ANNOTATION_CLUSTER_NAME, Serializer, TypeMeta, extract_cluster_name,
};
pub use request::RequestInfo;
