use axum::{
    body::Body,
    extract::Request,
    http::{Method, header},
};
use polycluster_kernel::apis::{ApiGroup, ApiGroupResources, ApiResource};
use serde_json::{Value, json};

/// Fluent builder for resource inventories.
///
/// ```
/// use polycluster_testing::InventoryBuilder;
///
/// let inventory = InventoryBuilder::new()
///     .resource("apps", "v1", "deployments", "Deployment", true)
///     .resource("", "v1", "namespaces", "Namespace", false)
///     .build();
/// assert_eq!(inventory.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InventoryBuilder {
    groups: Vec<ApiGroupResources>,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource under `group`/`version`, creating either if missing.
    /// Groups and versions keep the order they were first added in.
    pub fn resource(
        mut self,
        group: &str,
        version: &str,
        name: &str,
        kind: &str,
        namespaced: bool,
    ) -> Self {
        let resource = ApiResource::new(name, kind, namespaced);
        let idx = match self.groups.iter().position(|g| g.group.name == group) {
            Some(idx) => idx,
            None => {
                self.groups
                    .push(ApiGroupResources::new(ApiGroup::new(group, [version])));
                self.groups.len() - 1
            }
        };
        let mut resources = self.groups[idx]
            .versioned_resources
            .get(version)
            .cloned()
            .unwrap_or_default();
        resources.push(resource);
        self.groups[idx] = std::mem::take(&mut self.groups[idx]).with_resources(version, resources);
        self
    }

    /// Declare `group` with no resources.
    pub fn empty_group(mut self, group: &str, versions: &[&str]) -> Self {
        self.groups
            .push(ApiGroupResources::new(ApiGroup::new(group, versions.iter().copied())));
        self
    }

    pub fn build(self) -> Vec<ApiGroupResources> {
        self.groups
    }
}

pub fn deployment(namespace: &str, name: &str, replicas: u64) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "creationTimestamp": "2024-01-01T00:00:00Z",
            "labels": {"app": name},
        },
        "spec": {"replicas": replicas},
        "status": {"readyReplicas": replicas, "updatedReplicas": replicas, "availableReplicas": replicas},
    })
}

pub fn pod(namespace: &str, name: &str, node: &str) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "creationTimestamp": "2024-01-01T00:00:00Z",
            "labels": {"app": name},
        },
        "spec": {"nodeName": node},
        "status": {"phase": "Running"},
    })
}

/// A GET request for `uri`, optionally with an `Accept` header.
pub fn request(uri: &str, accept: Option<&str>) -> Request {
    let mut builder = axum::http::Request::builder().method(Method::GET).uri(uri);
    if let Some(accept) = accept {
        builder = builder.header(header::ACCEPT, accept);
    }
    builder
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("invalid test request for {uri}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_groups_resources_by_group_and_version() {
        let inventory = InventoryBuilder::new()
            .resource("apps", "v1", "deployments", "Deployment", true)
            .resource("apps", "v1", "deployments/status", "Deployment", true)
            .resource("apps", "v1beta1", "deployments", "Deployment", true)
            .empty_group("batch", &["v1"])
            .build();

        assert_eq!(inventory.len(), 2);
        let apps = &inventory[0];
        assert!(apps.group.has_version("v1"));
        assert!(apps.group.has_version("v1beta1"));
        assert_eq!(apps.versioned_resources["v1"].len(), 2);
        assert_eq!(inventory[1].group.name, "batch");
        assert!(inventory[1].versioned_resources.is_empty());
    }
}
