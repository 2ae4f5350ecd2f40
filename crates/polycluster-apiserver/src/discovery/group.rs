//! `/apis/{group}` discovery.

use super::{ClusterDiscoveryApis, serve_delegate, served_versions};
use crate::negotiation::write_typed_negotiated;
use crate::request::cluster_name_value;
use arc_swap::ArcSwap;
use axum::{Router, extract::Request, http::StatusCode, response::Response};
use indexmap::IndexMap;
use polycluster_kernel::apis::{ApiGroup, Serializer};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Immutable group table of one cluster, or of the global view.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupDiscoveryTable {
    groups: IndexMap<String, ApiGroup>,
}

impl GroupDiscoveryTable {
    /// Derive the group table for a resource set.
    ///
    /// Groups and versions follow the catalog source's order.  Only versions
    /// under which at least one resource is served are listed; the preferred
    /// version is the source's preference if served, otherwise the first
    /// served version.  The legacy core group lives under `/api` and never
    /// appears here.
    pub(crate) fn build(source: &IndexMap<String, ApiGroup>, apis: &ClusterDiscoveryApis) -> Self {
        let mut served: HashMap<&str, HashSet<&str>> = HashMap::new();
        for api in apis.values() {
            served
                .entry(api.group.as_str())
                .or_default()
                .extend(served_versions(source, api));
        }

        let mut groups = IndexMap::new();
        for (name, group) in source {
            if name.is_empty() {
                continue;
            }
            let Some(versions) = served.get(name.as_str()) else {
                continue;
            };
            let listed: Vec<_> = group
                .versions
                .iter()
                .filter(|v| versions.contains(v.version.as_str()))
                .cloned()
                .collect();
            if listed.is_empty() {
                continue;
            }
            let preferred_version = group
                .preferred_version
                .as_ref()
                .filter(|p| listed.contains(p))
                .or_else(|| listed.first())
                .cloned();

            groups.insert(
                name.clone(),
                ApiGroup {
                    name: name.clone(),
                    versions: listed,
                    preferred_version,
                },
            );
        }
        Self { groups }
    }

    pub fn get(&self, group: &str) -> Option<&ApiGroup> {
        self.groups.get(group)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Groups in presentation order.
    pub fn api_groups(&self) -> Vec<ApiGroup> {
        self.groups.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Serves `/apis/{group}` from the published group tables.
pub(crate) struct ClusterGroupDiscoveryHandler {
    serializer: Arc<dyn Serializer>,
    delegate: Router,

    global: ArcSwap<GroupDiscoveryTable>,
    handlers: ArcSwap<HashMap<String, Arc<GroupDiscoveryTable>>>,
}

impl ClusterGroupDiscoveryHandler {
    pub(crate) fn new(serializer: Arc<dyn Serializer>, delegate: Router) -> Self {
        Self {
            serializer,
            delegate,
            global: ArcSwap::from_pointee(GroupDiscoveryTable::default()),
            handlers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// The table for `cluster`, the global table when `cluster` is empty, or
    /// `None` for an unknown cluster.
    pub(crate) fn table_for(&self, cluster: &str) -> Option<Arc<GroupDiscoveryTable>> {
        if cluster.is_empty() {
            return Some(self.global.load_full());
        }
        self.handlers.load().get(cluster).cloned()
    }

    pub(crate) fn store_global(&self, table: GroupDiscoveryTable) {
        self.global.store(Arc::new(table));
    }

    pub(crate) fn clusters(&self) -> Arc<HashMap<String, Arc<GroupDiscoveryTable>>> {
        self.handlers.load_full()
    }

    pub(crate) fn store_clusters(&self, handlers: HashMap<String, Arc<GroupDiscoveryTable>>) {
        self.handlers.store(Arc::new(handlers));
    }

    pub(crate) async fn serve(&self, group: &str, req: Request) -> Response {
        let Some(table) = self.table_for(cluster_name_value(req.extensions())) else {
            debug!(group, "unknown cluster for group discovery");
            return serve_delegate(&self.delegate, req).await;
        };
        let Some(api_group) = table.get(group) else {
            return serve_delegate(&self.delegate, req).await;
        };

        write_typed_negotiated(
            self.serializer.as_ref(),
            StatusCode::OK,
            "APIGroup",
            "v1",
            api_group,
            req.headers(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ResourceDiscoveryApi;
    use polycluster_kernel::apis::{ApiResource, GroupResource};

    fn source() -> IndexMap<String, ApiGroup> {
        let mut batch = ApiGroup::new("batch", ["v1", "v1beta1"]);
        batch.preferred_version = batch.versions.get(1).cloned();
        [
            ApiGroup::new("", ["v1"]),
            ApiGroup::new("apps", ["v1"]),
            batch,
        ]
        .into_iter()
        .map(|g| (g.name.clone(), g))
        .collect()
    }

    fn api(group: &str, resource: &str, kind: &str, versions: &[&str]) -> (GroupResource, ResourceDiscoveryApi) {
        (
            GroupResource::new(group, resource),
            ResourceDiscoveryApi::new(
                group,
                ApiResource::new(resource, kind, true),
                versions.iter().copied(),
            ),
        )
    }

    #[test]
    fn groups_follow_source_order_and_skip_core() {
        let apis: ClusterDiscoveryApis = [
            api("batch", "jobs", "Job", &["v1"]),
            api("", "pods", "Pod", &["v1"]),
            api("apps", "deployments", "Deployment", &["v1"]),
        ]
        .into_iter()
        .collect();

        let table = GroupDiscoveryTable::build(&source(), &apis);
        assert_eq!(table.group_names().collect::<Vec<_>>(), vec!["apps", "batch"]);
    }

    #[test]
    fn unserved_preferred_version_falls_back_to_first_served() {
        let apis: ClusterDiscoveryApis = [api("batch", "jobs", "Job", &["v1"])].into_iter().collect();
        let table = GroupDiscoveryTable::build(&source(), &apis);
        let batch = table.get("batch").unwrap();
        assert_eq!(batch.versions.len(), 1);
        assert_eq!(batch.preferred_version.as_ref().unwrap().version, "v1");

        let apis: ClusterDiscoveryApis =
            [api("batch", "jobs", "Job", &["v1", "v1beta1"])].into_iter().collect();
        let table = GroupDiscoveryTable::build(&source(), &apis);
        let batch = table.get("batch").unwrap();
        assert_eq!(batch.versions.len(), 2);
        assert_eq!(batch.preferred_version.as_ref().unwrap().version, "v1beta1");
    }

    #[test]
    fn groups_unknown_to_the_source_are_excluded() {
        let apis: ClusterDiscoveryApis = [
            api("example.io", "widgets", "Widget", &["v1"]),
            api("apps", "deployments", "Deployment", &["v2"]),
        ]
        .into_iter()
        .collect();
        let table = GroupDiscoveryTable::build(&source(), &apis);
        assert!(table.is_empty());
    }
}
