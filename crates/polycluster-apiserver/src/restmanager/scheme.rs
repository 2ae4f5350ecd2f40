//! Built-in Kubernetes types.

use polycluster_kernel::apis::{GroupKind, ResourceScheme};

/// Kinds per group that ship with a stock Kubernetes API server.
const BUILTIN_KINDS: &[(&str, &[&str])] = &[
    (
        "",
        &[
            "Binding",
            "ComponentStatus",
            "ConfigMap",
            "Endpoints",
            "Event",
            "LimitRange",
            "Namespace",
            "Node",
            "PersistentVolume",
            "PersistentVolumeClaim",
            "Pod",
            "PodTemplate",
            "ReplicationController",
            "ResourceQuota",
            "Secret",
            "Service",
            "ServiceAccount",
        ],
    ),
    (
        "apps",
        &[
            "ControllerRevision",
            "DaemonSet",
            "Deployment",
            "ReplicaSet",
            "StatefulSet",
        ],
    ),
    ("autoscaling", &["HorizontalPodAutoscaler"]),
    ("batch", &["CronJob", "Job"]),
    ("coordination.k8s.io", &["Lease"]),
    ("discovery.k8s.io", &["EndpointSlice"]),
    ("events.k8s.io", &["Event"]),
    (
        "networking.k8s.io",
        &["Ingress", "IngressClass", "NetworkPolicy"],
    ),
    ("node.k8s.io", &["RuntimeClass"]),
    ("policy", &["PodDisruptionBudget"]),
    (
        "rbac.authorization.k8s.io",
        &["ClusterRole", "ClusterRoleBinding", "Role", "RoleBinding"],
    ),
    ("scheduling.k8s.io", &["PriorityClass"]),
    (
        "storage.k8s.io",
        &[
            "CSIDriver",
            "CSINode",
            "CSIStorageCapacity",
            "StorageClass",
            "VolumeAttachment",
        ],
    ),
];

/// [`ResourceScheme`] covering the built-in Kubernetes groups.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinResourceScheme;

impl BuiltinResourceScheme {
    pub fn new() -> Self {
        Self
    }

    fn kinds(group: &str) -> Option<&'static [&'static str]> {
        BUILTIN_KINDS
            .iter()
            .find(|(name, _)| *name == group)
            .map(|(_, kinds)| *kinds)
    }
}

impl ResourceScheme for BuiltinResourceScheme {
    fn is_known_group_kind(&self, gk: &GroupKind) -> bool {
        Self::kinds(&gk.group).is_some_and(|kinds| kinds.contains(&gk.kind.as_str()))
    }

    fn is_group_registered(&self, group: &str) -> bool {
        Self::kinds(group).is_some()
    }
}
