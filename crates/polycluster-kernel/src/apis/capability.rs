//! Capability contracts consumed by the API server.
//!
//! The discovery and routing layer never talks to a concrete catalog,
//! scheme or storage engine.  It depends on the traits below, and the
//! implementations are injected at construction time.

use super::error::StorageError;
use super::meta::{ApiGroup, GroupKind, GroupVersionKind, GroupVersionResource};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Catalog source
// ─────────────────────────────────────────────────────────────────────────────

/// Supplies the set of groups the aggregate view knows about.
///
/// The map is ordered by registration; discovery documents list groups and
/// versions in that order.
pub trait CatalogSource: Send + Sync {
    fn api_groups(&self) -> Arc<IndexMap<String, ApiGroup>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource scheme
// ─────────────────────────────────────────────────────────────────────────────

/// The deployment's registry of built-in types.
///
/// Resources whose `(group, kind)` is unknown to the scheme are treated as
/// custom resources and are not served by the REST registry.
pub trait ResourceScheme: Send + Sync {
    fn is_known_group_kind(&self, gk: &GroupKind) -> bool;

    fn is_group_registered(&self, group: &str) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a storage factory needs to build storage for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStorageConfig {
    pub resource: GroupVersionResource,
    pub kind: GroupVersionKind,
    pub namespaced: bool,
    pub storage_media_type: String,
}

/// Where a storage call is scoped.  `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageScope {
    pub cluster: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub limit: Option<usize>,
}

/// Storage bound to a single resource type.
#[async_trait]
pub trait ResourceStorage: Send + Sync {
    async fn get(&self, scope: &StorageScope, name: &str) -> Result<Value, StorageError>;

    async fn list(
        &self,
        scope: &StorageScope,
        options: &ListOptions,
    ) -> Result<Vec<Value>, StorageError>;
}

/// Builds [`ResourceStorage`] instances and reports which request verbs the
/// backing engine can serve.
pub trait StorageFactory: Send + Sync {
    fn supported_request_verbs(&self) -> Vec<String>;

    fn new_resource_storage(
        &self,
        config: &ResourceStorageConfig,
    ) -> Result<Arc<dyn ResourceStorage>, StorageError>;

    /// Forget every object collected from `cluster`.  Storages built earlier
    /// must stop returning them.
    fn remove_cluster(&self, cluster: &str);
}
