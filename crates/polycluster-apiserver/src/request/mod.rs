//! Request-scoped context.
//!
//! Upstream filters attach values to the request's extensions; the
//! discovery and resource handlers only ever read them.

mod filters;
mod resolver;

pub use filters::{remove_field_selector, with_cluster_path, with_request_info};
pub(crate) use resolver::split_path;
pub use resolver::{
    NamespaceScopedResolver, PathRequestInfoResolver, RequestInfoResolver, ResolveError,
};

use axum::http::Extensions;

/// Path prefix under which a request is scoped to a single cluster.
pub const CLUSTER_PATH_PREFIX: &str = "/clusters/";

/// Name of the cluster a request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterName(pub String);

/// The `fieldSelector` query parameter, lifted out of the URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector(pub String);

/// Attach a cluster scope to a request's extensions.
pub fn with_cluster_name(extensions: &mut Extensions, cluster: impl Into<String>) {
    extensions.insert(ClusterName(cluster.into()));
}

/// The cluster the request is scoped to, or `""` when unscoped.
pub fn cluster_name_value(extensions: &Extensions) -> &str {
    extensions
        .get::<ClusterName>()
        .map(|c| c.0.as_str())
        .unwrap_or_default()
}
