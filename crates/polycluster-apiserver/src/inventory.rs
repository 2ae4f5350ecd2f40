//! Resource inventories and cluster catalogs.
//!
//! The initial inventory seeds the [`RestManager`](crate::restmanager::RestManager)
//! resource table.  A cluster catalog file lists, per cluster, the resources
//! it serves and optionally objects to preload into in-memory storage:
//!
//! ```json
//! [
//!   {
//!     "name": "east",
//!     "resources": [
//!       {"group": {"name": "apps", "versions": [{"groupVersion": "apps/v1", "version": "v1"}]},
//!        "versionedResources": {"v1": [{"name": "deployments", "kind": "Deployment", "namespaced": true}]}}
//!     ],
//!     "objects": [{"group": "apps", "resource": "deployments", "object": {"metadata": {"name": "web"}}}]
//!   }
//! ]
//! ```

use crate::config::ConfigError;
use polycluster_kernel::apis::{ApiGroup, ApiGroupResources, ApiResource, GroupResource};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// An object to preload for a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedObject {
    #[serde(default)]
    pub group: String,
    pub resource: String,
    pub object: Value,
}

impl SeedObject {
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(&self.group, &self.resource)
    }
}

/// What one cluster serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCatalog {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ApiGroupResources>,
    #[serde(default)]
    pub objects: Vec<SeedObject>,
}

pub fn load_inventory(path: &Path) -> Result<Vec<ApiGroupResources>, ConfigError> {
    read_json(path)
}

pub fn load_cluster_catalogs(path: &Path) -> Result<Vec<ClusterCatalog>, ConfigError> {
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resource(name: &str, singular: &str, kind: &str, namespaced: bool) -> ApiResource {
    ApiResource::new(name, kind, namespaced).with_singular_name(singular)
}

/// Inventory of the common built-in resources.
pub fn builtin_inventory() -> Vec<ApiGroupResources> {
    vec![
        ApiGroupResources::new(ApiGroup::new("", ["v1"])).with_resources(
            "v1",
            vec![
                resource("configmaps", "configmap", "ConfigMap", true),
                resource("events", "event", "Event", true),
                resource("limitranges", "limitrange", "LimitRange", true),
                resource("namespaces", "namespace", "Namespace", false),
                resource("namespaces/status", "", "Namespace", false),
                resource("nodes", "node", "Node", false),
                resource("persistentvolumeclaims", "persistentvolumeclaim", "PersistentVolumeClaim", true),
                resource("persistentvolumes", "persistentvolume", "PersistentVolume", false),
                resource("pods", "pod", "Pod", true),
                resource("pods/log", "", "Pod", true),
                resource("secrets", "secret", "Secret", true),
                resource("serviceaccounts", "serviceaccount", "ServiceAccount", true),
                resource("services", "service", "Service", true),
            ],
        ),
        ApiGroupResources::new(ApiGroup::new("apps", ["v1"])).with_resources(
            "v1",
            vec![
                resource("controllerrevisions", "controllerrevision", "ControllerRevision", true),
                resource("daemonsets", "daemonset", "DaemonSet", true),
                resource("deployments", "deployment", "Deployment", true),
                resource("deployments/status", "", "Deployment", true),
                resource("replicasets", "replicaset", "ReplicaSet", true),
                resource("statefulsets", "statefulset", "StatefulSet", true),
            ],
        ),
        ApiGroupResources::new(ApiGroup::new("batch", ["v1"])).with_resources(
            "v1",
            vec![
                resource("cronjobs", "cronjob", "CronJob", true),
                resource("jobs", "job", "Job", true),
            ],
        ),
        ApiGroupResources::new(ApiGroup::new("networking.k8s.io", ["v1"])).with_resources(
            "v1",
            vec![
                resource("ingresses", "ingress", "Ingress", true),
                resource("networkpolicies", "networkpolicy", "NetworkPolicy", true),
            ],
        ),
        ApiGroupResources::new(ApiGroup::new("rbac.authorization.k8s.io", ["v1"])).with_resources(
            "v1",
            vec![
                resource("clusterrolebindings", "clusterrolebinding", "ClusterRoleBinding", false),
                resource("clusterroles", "clusterrole", "ClusterRole", false),
                resource("rolebindings", "rolebinding", "RoleBinding", true),
                resource("roles", "role", "Role", true),
            ],
        ),
        ApiGroupResources::new(ApiGroup::new("storage.k8s.io", ["v1"])).with_resources(
            "v1",
            vec![
                resource("csistoragecapacities", "csistoragecapacity", "CSIStorageCapacity", true),
                resource("storageclasses", "storageclass", "StorageClass", false),
            ],
        ),
    ]
}
