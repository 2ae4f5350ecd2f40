//! Resource registry.
//!
//! [`RestManager`] owns the set of built-in resources the server can answer
//! for, the group catalog derived from what clusters actually serve, and the
//! per-`GroupVersionResource` bindings used by the resource handler.  It is
//! the [`CatalogSource`] behind the discovery tables.

mod info;
mod scheme;
pub mod table;

pub use info::{RequestScope, RestResourceInfo};
pub use scheme::BuiltinResourceScheme;
pub use table::TableConvertor;

use crate::discovery::{ClusterDiscoveryApis, ResourceDiscoveryApi};
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use polycluster_kernel::apis::{
    ApiGroup, ApiGroupResources, ApiResource, CatalogSource, GroupKind, GroupResource,
    GroupVersionForDiscovery, GroupVersionResource, ResourceScheme, ResourceStorageConfig,
    Serializer, StorageError, StorageFactory,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_STORAGE_MEDIA_TYPE: &str = "application/json";

pub struct RestManager {
    serializer: Arc<dyn Serializer>,
    storage_factory: Arc<dyn StorageFactory>,
    scheme: Arc<dyn ResourceScheme>,
    storage_media_type: String,
    request_verbs: Vec<String>,

    lock: Mutex<()>,
    resources: Arc<IndexMap<GroupResource, ApiResource>>,
    groups: ArcSwap<IndexMap<String, ApiGroup>>,
    rest_resource_infos: ArcSwap<HashMap<GroupVersionResource, RestResourceInfo>>,
}

impl RestManager {
    /// Seed the resource table from the initial inventory.
    ///
    /// The first occurrence of a group-resource wins.  Subresources and
    /// kinds unknown to `scheme` are skipped; every recorded resource
    /// advertises the verbs the storage factory supports.  The group
    /// catalog and the binding table start empty.
    pub fn new(
        serializer: Arc<dyn Serializer>,
        storage_factory: Arc<dyn StorageFactory>,
        scheme: Arc<dyn ResourceScheme>,
        initial: &[ApiGroupResources],
    ) -> Self {
        let request_verbs = storage_factory.supported_request_verbs();

        let mut resources = IndexMap::new();
        for group_resources in initial {
            let group = &group_resources.group;
            for version in &group.versions {
                let Some(list) = group_resources.versioned_resources.get(&version.version) else {
                    continue;
                };
                for resource in list {
                    if resource.is_subresource() {
                        continue;
                    }
                    let gr = GroupResource::new(&group.name, &resource.name);
                    if resources.contains_key(&gr) {
                        continue;
                    }
                    if !scheme.is_known_group_kind(&GroupKind::new(&group.name, &resource.kind)) {
                        debug!(resource = %gr, kind = %resource.kind, "skipping custom resource");
                        continue;
                    }

                    let mut resource = resource.clone();
                    resource.verbs = request_verbs.clone();
                    resources.insert(gr, resource);
                }
            }
        }
        info!(resources = resources.len(), "seeded resource table");

        Self {
            serializer,
            storage_factory,
            scheme,
            storage_media_type: DEFAULT_STORAGE_MEDIA_TYPE.to_string(),
            request_verbs,
            lock: Mutex::new(()),
            resources: Arc::new(resources),
            groups: ArcSwap::from_pointee(IndexMap::new()),
            rest_resource_infos: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Builder: media type handed to the storage factory.
    pub fn with_storage_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.storage_media_type = media_type.into();
        self
    }

    /// The published group catalog.
    pub fn api_groups(&self) -> Arc<IndexMap<String, ApiGroup>> {
        self.groups.load_full()
    }

    /// The binding of `gvr`, or an empty binding if unknown.
    pub fn rest_resource_info(&self, gvr: &GroupVersionResource) -> RestResourceInfo {
        self.rest_resource_infos
            .load()
            .get(gvr)
            .cloned()
            .unwrap_or_default()
    }

    /// The seeded resource table.
    pub fn resources(&self) -> Arc<IndexMap<GroupResource, ApiResource>> {
        self.resources.clone()
    }

    pub fn request_verbs(&self) -> &[String] {
        &self.request_verbs
    }

    /// Drop everything the storage factory holds for `cluster`.
    pub fn remove_cluster(&self, cluster: &str) {
        let _guard = self.lock.lock();
        self.storage_factory.remove_cluster(cluster);
        info!(cluster, "removed cluster objects from storage");
    }

    /// Register what a cluster serves.
    ///
    /// The inventory is filtered against the resource table; the result is
    /// the cluster's discovery resource set.  Groups and versions not yet in
    /// the catalog are appended to it, and every new `GroupVersionResource`
    /// gets a binding wired through the storage factory.  A binding whose
    /// storage cannot be created stays registered only until a later load
    /// names it again.
    pub fn load_resources(&self, inventory: &[ApiGroupResources]) -> ClusterDiscoveryApis {
        let _guard = self.lock.lock();

        let mut apis = ClusterDiscoveryApis::new();
        for group_resources in inventory {
            let group = &group_resources.group;
            for version in &group.versions {
                let Some(list) = group_resources.versioned_resources.get(&version.version) else {
                    continue;
                };
                for resource in list {
                    if resource.is_subresource() {
                        continue;
                    }
                    let gr = GroupResource::new(&group.name, &resource.name);
                    let Some(api_resource) = self.resources.get(&gr) else {
                        continue;
                    };
                    apis.entry(gr)
                        .or_insert_with(|| {
                            ResourceDiscoveryApi::new(
                                &group.name,
                                api_resource.clone(),
                                std::iter::empty::<String>(),
                            )
                        })
                        .versions
                        .insert(version.version.clone());
                }
            }
        }

        if let Some(groups) = merge_groups(&self.groups.load(), inventory, &apis) {
            info!(groups = groups.len(), "publishing group catalog");
            self.groups.store(Arc::new(groups));
        }

        let infos = self.rest_resource_infos.load_full();
        let mut updated: Option<HashMap<_, _>> = None;
        for api in apis.values() {
            for version in &api.versions {
                let gvr = GroupVersionResource::new(&api.group, version, &api.resource.name);
                if infos.get(&gvr).is_some_and(|info| !info.is_empty()) {
                    continue;
                }
                let info = self.wire_or_register(&gvr, &api.resource);
                updated
                    .get_or_insert_with(|| infos.as_ref().clone())
                    .insert(gvr, info);
            }
        }
        if let Some(updated) = updated {
            info!(bindings = updated.len(), "publishing resource bindings");
            self.rest_resource_infos.store(Arc::new(updated));
        }

        apis
    }

    fn wire_or_register(&self, gvr: &GroupVersionResource, resource: &ApiResource) -> RestResourceInfo {
        match self.new_wired_info(gvr, resource) {
            Ok(info) => info,
            Err(err) => {
                warn!(resource = %gvr, error = %err, "failed to wire resource storage");
                RestResourceInfo::registered(resource.clone())
            }
        }
    }

    fn new_wired_info(
        &self,
        gvr: &GroupVersionResource,
        resource: &ApiResource,
    ) -> Result<RestResourceInfo, StorageError> {
        let kind = gvr.group_version().with_kind(&resource.kind);
        let config = ResourceStorageConfig {
            resource: gvr.clone(),
            kind: kind.clone(),
            namespaced: resource.namespaced,
            storage_media_type: self.storage_media_type.clone(),
        };
        let storage = self.storage_factory.new_resource_storage(&config)?;

        let scope = RequestScope {
            resource: gvr.clone(),
            kind,
            namespaced: resource.namespaced,
            serializer: self.serializer.clone(),
            table_convertor: TableConvertor::for_resource(&gvr.group_resource(), self.scheme.as_ref()),
        };
        Ok(RestResourceInfo {
            api_resource: resource.clone(),
            request_scope: Some(Arc::new(scope)),
            storage: Some(storage),
        })
    }
}

impl CatalogSource for RestManager {
    fn api_groups(&self) -> Arc<IndexMap<String, ApiGroup>> {
        RestManager::api_groups(self)
    }
}

/// Extend `current` with the groups and versions `apis` serves.
///
/// Returns `None` when nothing is new.  New groups and versions are appended
/// in inventory order; a new group prefers the inventory's preferred version
/// if it is served, otherwise its first served version.
fn merge_groups(
    current: &IndexMap<String, ApiGroup>,
    inventory: &[ApiGroupResources],
    apis: &ClusterDiscoveryApis,
) -> Option<IndexMap<String, ApiGroup>> {
    let served: HashSet<(&str, &str)> = apis
        .values()
        .flat_map(|api| api.versions.iter().map(|v| (api.group.as_str(), v.as_str())))
        .collect();

    let mut merged: Option<IndexMap<String, ApiGroup>> = None;
    for group_resources in inventory {
        let group = &group_resources.group;
        let versions: Vec<&GroupVersionForDiscovery> = group
            .versions
            .iter()
            .filter(|v| served.contains(&(group.name.as_str(), v.version.as_str())))
            .collect();
        let preferred = group
            .preferred_version
            .as_ref()
            .filter(|p| versions.contains(p))
            .or(versions.first().copied());

        for version in &versions {
            let known = merged
                .as_ref()
                .unwrap_or(current)
                .get(&group.name)
                .is_some_and(|g| g.versions.contains(*version));
            if known {
                continue;
            }
            merged
                .get_or_insert_with(|| current.clone())
                .entry(group.name.clone())
                .or_insert_with(|| ApiGroup {
                    name: group.name.clone(),
                    versions: Vec::new(),
                    preferred_version: preferred.cloned(),
                })
                .versions
                .push((*version).clone());
        }
    }
    merged
}
