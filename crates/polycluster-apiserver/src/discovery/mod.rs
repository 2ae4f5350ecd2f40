//! Aggregated discovery.
//!
//! [`DiscoveryManager`] answers the discovery family of paths for the global
//! view and for every cluster:
//!
//! ```text
//! /api                       APIVersions             (apiVersion stripped)
//! /api/{version}             APIResourceList         (apiVersion stripped)
//! /apis                      APIGroupList
//! /apis/{group}              APIGroup
//! /apis/{group}/{version}    APIResourceList
//! ```
//!
//! Every table is an immutable snapshot behind an [`ArcSwap`].  Readers do a
//! single load and never block; writers serialize on one mutex, build new
//! tables off to the side and publish each with one store.

mod group;
mod version;

pub use group::GroupDiscoveryTable;
pub use version::VersionDiscoveryTable;

use crate::negotiation::{StripVersionSerializer, write_typed_negotiated};
use crate::request::cluster_name_value;
use arc_swap::ArcSwap;
use axum::{Router, extract::Request, http::StatusCode, response::Response};
use group::ClusterGroupDiscoveryHandler;
use indexmap::{IndexMap, IndexSet, map::Entry};
use parking_lot::Mutex;
use polycluster_kernel::apis::{
    ApiGroup, ApiGroupList, ApiResource, ApiVersions, CatalogSource, GroupResource, GroupVersion,
    GroupVersionResource, Serializer,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{debug, info};
use version::ClusterVersionDiscoveryHandler;

// ─────────────────────────────────────────────────────────────────────────────
// Cluster resource sets
// ─────────────────────────────────────────────────────────────────────────────

/// One resource a cluster serves, with every version it is served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDiscoveryApi {
    pub group: String,
    pub resource: ApiResource,
    pub versions: IndexSet<String>,
}

impl ResourceDiscoveryApi {
    pub fn new<I, S>(group: impl Into<String>, resource: ApiResource, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group: group.into(),
            resource,
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }
}

/// A cluster's resource set, keyed and ordered by group-resource.
pub type ClusterDiscoveryApis = IndexMap<GroupResource, ResourceDiscoveryApi>;

/// Versions of `api` that the catalog source declares for its group.
pub(crate) fn served_versions<'a>(
    source: &'a IndexMap<String, ApiGroup>,
    api: &'a ResourceDiscoveryApi,
) -> impl Iterator<Item = &'a str> + 'a {
    let group = source.get(&api.group);
    api.versions
        .iter()
        .map(String::as_str)
        .filter(move |v| group.is_some_and(|g| g.has_version(v)))
}

/// Union of several clusters' resource sets.
///
/// Clusters are folded in the order given; the first cluster to serve a
/// group-resource provides its metadata and later ones only add versions.
pub fn merge_cluster_apis<'a>(
    clusters: impl IntoIterator<Item = &'a ClusterDiscoveryApis>,
) -> ClusterDiscoveryApis {
    let mut merged = ClusterDiscoveryApis::new();
    for apis in clusters {
        for (gr, api) in apis {
            match merged.entry(gr.clone()) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().versions.extend(api.versions.iter().cloned());
                }
                Entry::Vacant(entry) => {
                    entry.insert(api.clone());
                }
            }
        }
    }
    merged
}

pub(crate) async fn serve_delegate(delegate: &Router, req: Request) -> Response {
    match delegate.clone().oneshot(req).await {
        Ok(resp) => resp,
        Err(never) => match never {},
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Path classification
// ─────────────────────────────────────────────────────────────────────────────

/// Which discovery document a path asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryPath {
    /// `/api`
    LegacyVersions,
    /// `/api/{version}`
    LegacyResources { version: String },
    /// `/apis`
    Groups,
    /// `/apis/{group}`
    Group { group: String },
    /// `/apis/{group}/{version}`
    GroupVersion { group: String, version: String },
    /// Anything else.
    Delegate,
}

impl DiscoveryPath {
    pub fn classify(path: &str) -> Self {
        let parts = crate::request::split_path(path);
        match parts.as_slice() {
            ["api"] => Self::LegacyVersions,
            ["api", version] => Self::LegacyResources {
                version: version.to_string(),
            },
            ["apis"] => Self::Groups,
            ["apis", group] => Self::Group {
                group: group.to_string(),
            },
            ["apis", group, version] => Self::GroupVersion {
                group: group.to_string(),
                version: version.to_string(),
            },
            _ => Self::Delegate,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DiscoveryManager
// ─────────────────────────────────────────────────────────────────────────────

pub struct DiscoveryManager {
    group_source: Arc<dyn CatalogSource>,
    serializer: Arc<dyn Serializer>,
    strip_version_serializer: Arc<dyn Serializer>,
    delegate: Router,

    /// Cluster resource sets, ordered by cluster name.  Held for the whole
    /// of every rebuild.
    discovery_lock: Mutex<BTreeMap<String, Arc<ClusterDiscoveryApis>>>,

    group_handler: ClusterGroupDiscoveryHandler,
    version_handler: ClusterVersionDiscoveryHandler,

    api_groups: ArcSwap<Vec<ApiGroup>>,
    cluster_api_groups: ArcSwap<HashMap<String, Arc<Vec<ApiGroup>>>>,
}

impl DiscoveryManager {
    /// Build a manager with empty tables.  Unmatched requests are answered
    /// by `delegate`.
    pub fn new(
        serializer: Arc<dyn Serializer>,
        group_source: Arc<dyn CatalogSource>,
        delegate: Router,
    ) -> Self {
        let strip_version_serializer: Arc<dyn Serializer> =
            Arc::new(StripVersionSerializer::new(serializer.clone()));
        Self {
            group_handler: ClusterGroupDiscoveryHandler::new(serializer.clone(), delegate.clone()),
            version_handler: ClusterVersionDiscoveryHandler::new(
                serializer.clone(),
                strip_version_serializer.clone(),
                delegate.clone(),
            ),
            group_source,
            serializer,
            strip_version_serializer,
            delegate,
            discovery_lock: Mutex::new(BTreeMap::new()),
            api_groups: ArcSwap::from_pointee(Vec::new()),
            cluster_api_groups: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Whether `gvr` is served by `cluster`, or by any cluster when
    /// `cluster` is empty.
    pub fn resource_enabled(&self, cluster: &str, gvr: &GroupVersionResource) -> bool {
        self.version_handler
            .table_for(cluster)
            .is_some_and(|table| table.has(gvr))
    }

    /// Group list of `cluster`, of the global view when `cluster` is empty,
    /// or `None` for an unknown cluster.
    pub fn api_groups(&self, cluster: &str) -> Option<Arc<Vec<ApiGroup>>> {
        if cluster.is_empty() {
            return Some(self.api_groups.load_full());
        }
        self.cluster_api_groups.load().get(cluster).cloned()
    }

    pub fn group_table(&self, cluster: &str) -> Option<Arc<GroupDiscoveryTable>> {
        self.group_handler.table_for(cluster)
    }

    pub fn version_table(&self, cluster: &str) -> Option<Arc<VersionDiscoveryTable>> {
        self.version_handler.table_for(cluster)
    }

    /// Names of the clusters with a published catalog, sorted.
    pub fn clusters(&self) -> Vec<String> {
        let mut names: Vec<_> = self.cluster_api_groups.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Replace the resource set of `cluster` and republish its tables and
    /// the global ones.
    pub fn set_cluster_group_resource(&self, cluster: &str, apis: ClusterDiscoveryApis) {
        let mut clusters = self.discovery_lock.lock();
        let apis = Arc::new(apis);
        clusters.insert(cluster.to_string(), apis.clone());

        let source = self.group_source.api_groups();
        let versions = VersionDiscoveryTable::build(&source, &apis);
        let groups = GroupDiscoveryTable::build(&source, &apis);
        let group_list = groups.api_groups();
        info!(
            cluster,
            groups = group_list.len(),
            resources = apis.len(),
            "publishing cluster discovery"
        );

        let mut version_tables = (*self.version_handler.clusters()).clone();
        version_tables.insert(cluster.to_string(), Arc::new(versions));
        self.version_handler.store_clusters(version_tables);

        let mut group_tables = (*self.group_handler.clusters()).clone();
        group_tables.insert(cluster.to_string(), Arc::new(groups));
        self.group_handler.store_clusters(group_tables);

        let mut lists = (**self.cluster_api_groups.load()).clone();
        lists.insert(cluster.to_string(), Arc::new(group_list));
        self.cluster_api_groups.store(Arc::new(lists));

        self.publish_global(&clusters, &source);
    }

    /// Forget `cluster`.  Its scoped discovery paths fall through to the
    /// delegate afterwards.
    pub fn remove_cluster(&self, cluster: &str) {
        let mut clusters = self.discovery_lock.lock();
        if clusters.remove(cluster).is_none() {
            return;
        }
        info!(cluster, "removing cluster discovery");

        let mut version_tables = (*self.version_handler.clusters()).clone();
        version_tables.remove(cluster);
        self.version_handler.store_clusters(version_tables);

        let mut group_tables = (*self.group_handler.clusters()).clone();
        group_tables.remove(cluster);
        self.group_handler.store_clusters(group_tables);

        let mut lists = (**self.cluster_api_groups.load()).clone();
        lists.remove(cluster);
        self.cluster_api_groups.store(Arc::new(lists));

        let source = self.group_source.api_groups();
        self.publish_global(&clusters, &source);
    }

    /// Rebuild every table against the current catalog source.
    pub fn refresh_catalog(&self) {
        let clusters = self.discovery_lock.lock();
        let source = self.group_source.api_groups();

        let mut version_tables = HashMap::with_capacity(clusters.len());
        let mut group_tables = HashMap::with_capacity(clusters.len());
        let mut lists = HashMap::with_capacity(clusters.len());
        for (name, apis) in clusters.iter() {
            let groups = GroupDiscoveryTable::build(&source, apis);
            lists.insert(name.clone(), Arc::new(groups.api_groups()));
            group_tables.insert(name.clone(), Arc::new(groups));
            version_tables.insert(
                name.clone(),
                Arc::new(VersionDiscoveryTable::build(&source, apis)),
            );
        }
        self.version_handler.store_clusters(version_tables);
        self.group_handler.store_clusters(group_tables);
        self.cluster_api_groups.store(Arc::new(lists));

        self.publish_global(&clusters, &source);
        debug!(clusters = clusters.len(), "refreshed discovery catalog");
    }

    fn publish_global(
        &self,
        clusters: &BTreeMap<String, Arc<ClusterDiscoveryApis>>,
        source: &IndexMap<String, ApiGroup>,
    ) {
        let merged = merge_cluster_apis(clusters.values().map(Arc::as_ref));
        let versions = VersionDiscoveryTable::build(source, &merged);
        let groups = GroupDiscoveryTable::build(source, &merged);
        let group_list = groups.api_groups();

        self.version_handler.store_global(versions);
        self.group_handler.store_global(groups);
        self.api_groups.store(Arc::new(group_list));
    }

    /// Answer a discovery request.  Anything that is not a discovery path,
    /// or names an unknown cluster, group or version, goes to the delegate.
    pub async fn serve(&self, req: Request) -> Response {
        match DiscoveryPath::classify(req.uri().path()) {
            DiscoveryPath::LegacyVersions => self.serve_legacy_versions(req),
            DiscoveryPath::LegacyResources { version } => {
                self.version_handler
                    .serve(GroupVersion::new("", version), req)
                    .await
            }
            DiscoveryPath::Groups => self.serve_groups(req).await,
            DiscoveryPath::Group { group } => self.group_handler.serve(&group, req).await,
            DiscoveryPath::GroupVersion { group, version } => {
                self.version_handler
                    .serve(GroupVersion::new(group, version), req)
                    .await
            }
            DiscoveryPath::Delegate => serve_delegate(&self.delegate, req).await,
        }
    }

    fn serve_legacy_versions(&self, req: Request) -> Response {
        let versions = ApiVersions {
            versions: vec!["v1".to_string()],
        };
        write_typed_negotiated(
            self.strip_version_serializer.as_ref(),
            StatusCode::OK,
            "APIVersions",
            "v1",
            &versions,
            req.headers(),
        )
    }

    async fn serve_groups(&self, req: Request) -> Response {
        let cluster = cluster_name_value(req.extensions());
        let Some(groups) = self.api_groups(cluster) else {
            debug!(cluster, "unknown cluster for group list");
            return serve_delegate(&self.delegate, req).await;
        };

        let list = ApiGroupList {
            groups: groups.as_ref().clone(),
        };
        write_typed_negotiated(
            self.serializer.as_ref(),
            StatusCode::OK,
            "APIGroupList",
            "v1",
            &list,
            req.headers(),
        )
    }
}
