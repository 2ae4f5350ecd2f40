//! `/api/{version}` and `/apis/{group}/{version}` discovery.

use super::{ClusterDiscoveryApis, serve_delegate, served_versions};
use crate::negotiation::write_typed_negotiated;
use crate::request::cluster_name_value;
use arc_swap::ArcSwap;
use axum::{Router, extract::Request, http::StatusCode, response::Response};
use indexmap::IndexMap;
use polycluster_kernel::apis::{
    ApiGroup, ApiResource, ApiResourceList, GroupVersion, GroupVersionResource, Serializer,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Immutable resource table of one cluster, or of the global view.
///
/// Besides the per-version resource lists it keeps the set of served
/// `GroupVersionResource` strings, which answers "is this resource enabled"
/// without walking the lists.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VersionDiscoveryTable {
    resources: IndexMap<GroupVersion, Vec<ApiResource>>,
    gvrs: HashSet<String>,
}

impl VersionDiscoveryTable {
    pub(crate) fn build(source: &IndexMap<String, ApiGroup>, apis: &ClusterDiscoveryApis) -> Self {
        let mut table = Self::default();
        for api in apis.values() {
            for version in served_versions(source, api) {
                let gv = GroupVersion::new(&api.group, version);
                table
                    .gvrs
                    .insert(gv.with_resource(&api.resource.name).to_string());
                table
                    .resources
                    .entry(gv)
                    .or_default()
                    .push(api.resource.clone());
            }
        }
        table
    }

    pub fn resources(&self, gv: &GroupVersion) -> Option<&[ApiResource]> {
        self.resources.get(gv).map(Vec::as_slice)
    }

    pub fn has(&self, gvr: &GroupVersionResource) -> bool {
        self.gvrs.contains(&gvr.to_string())
    }

    pub fn group_versions(&self) -> impl Iterator<Item = &GroupVersion> {
        self.resources.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Serves resource lists from the published version tables.
pub(crate) struct ClusterVersionDiscoveryHandler {
    serializer: Arc<dyn Serializer>,
    strip_version_serializer: Arc<dyn Serializer>,
    delegate: Router,

    global: ArcSwap<VersionDiscoveryTable>,
    handlers: ArcSwap<HashMap<String, Arc<VersionDiscoveryTable>>>,
}

impl ClusterVersionDiscoveryHandler {
    pub(crate) fn new(
        serializer: Arc<dyn Serializer>,
        strip_version_serializer: Arc<dyn Serializer>,
        delegate: Router,
    ) -> Self {
        Self {
            serializer,
            strip_version_serializer,
            delegate,
            global: ArcSwap::from_pointee(VersionDiscoveryTable::default()),
            handlers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub(crate) fn table_for(&self, cluster: &str) -> Option<Arc<VersionDiscoveryTable>> {
        if cluster.is_empty() {
            return Some(self.global.load_full());
        }
        self.handlers.load().get(cluster).cloned()
    }

    pub(crate) fn store_global(&self, table: VersionDiscoveryTable) {
        self.global.store(Arc::new(table));
    }

    pub(crate) fn clusters(&self) -> Arc<HashMap<String, Arc<VersionDiscoveryTable>>> {
        self.handlers.load_full()
    }

    pub(crate) fn store_clusters(&self, handlers: HashMap<String, Arc<VersionDiscoveryTable>>) {
        self.handlers.store(Arc::new(handlers));
    }

    /// Serve the resource list of `gv`.  The legacy core group (`/api/{v}`)
    /// is written without `apiVersion`.
    pub(crate) async fn serve(&self, gv: GroupVersion, req: Request) -> Response {
        let Some(table) = self.table_for(cluster_name_value(req.extensions())) else {
            debug!(group_version = %gv, "unknown cluster for version discovery");
            return serve_delegate(&self.delegate, req).await;
        };
        let Some(resources) = table.resources(&gv) else {
            return serve_delegate(&self.delegate, req).await;
        };

        let list = ApiResourceList {
            group_version: gv.to_string(),
            resources: resources.to_vec(),
        };
        let serializer = if gv.group.is_empty() {
            &self.strip_version_serializer
        } else {
            &self.serializer
        };
        write_typed_negotiated(
            serializer.as_ref(),
            StatusCode::OK,
            "APIResourceList",
            "v1",
            &list,
            req.headers(),
        )
    }
}
