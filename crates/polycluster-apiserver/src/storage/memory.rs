//! In-memory [`StorageFactory`] implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use polycluster_kernel::apis::{
    GroupResource, GroupVersionKind, ListOptions, ResourceStorage, ResourceStorageConfig,
    SHADOW_ANNOTATION_CLUSTER_NAME, StorageError, StorageFactory, StorageScope,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    cluster: String,
    namespace: String,
    name: String,
}

type ObjectStore = DashMap<GroupResource, BTreeMap<ObjectKey, Value>>;

/// [`StorageFactory`] keeping every cluster's objects in process memory.
///
/// Objects are stored per group-resource, so all versions of a resource
/// share them.  Suitable for tests and single-node demos.
#[derive(Default, Clone)]
pub struct InMemoryStorageFactory {
    store: Arc<ObjectStore>,
}

impl InMemoryStorageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `object` as collected from `cluster`.
    ///
    /// The object is annotated with its cluster; an object with the same
    /// cluster, namespace and name is replaced.
    pub fn insert(
        &self,
        cluster: &str,
        resource: GroupResource,
        mut object: Value,
    ) -> Result<(), StorageError> {
        let name = object
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(StorageError::Internal(format!(
                "{resource} object without metadata.name"
            )));
        }
        let namespace = object
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) else {
            return Err(StorageError::Internal(format!("{resource} object without metadata")));
        };
        let annotations = metadata.entry("annotations").or_insert_with(|| json!({}));
        if let Some(annotations) = annotations.as_object_mut() {
            annotations.insert(
                SHADOW_ANNOTATION_CLUSTER_NAME.to_string(),
                Value::String(cluster.to_string()),
            );
        }

        let key = ObjectKey {
            cluster: cluster.to_string(),
            namespace,
            name,
        };
        self.store.entry(resource).or_default().insert(key, object);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store.iter().map(|objects| objects.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageFactory for InMemoryStorageFactory {
    fn supported_request_verbs(&self) -> Vec<String> {
        vec!["get".to_string(), "list".to_string()]
    }

    fn new_resource_storage(
        &self,
        config: &ResourceStorageConfig,
    ) -> Result<Arc<dyn ResourceStorage>, StorageError> {
        Ok(Arc::new(InMemoryResourceStorage {
            store: self.store.clone(),
            resource: config.resource.group_resource(),
            kind: config.kind.clone(),
            namespaced: config.namespaced,
        }))
    }

    fn remove_cluster(&self, cluster: &str) {
        for mut objects in self.store.iter_mut() {
            objects.retain(|key, _| key.cluster != cluster);
        }
    }
}

/// Storage of one resource type, reading the factory's shared store.
pub struct InMemoryResourceStorage {
    store: Arc<ObjectStore>,
    resource: GroupResource,
    kind: GroupVersionKind,
    namespaced: bool,
}

impl InMemoryResourceStorage {
    fn in_scope(&self, key: &ObjectKey, scope: &StorageScope) -> bool {
        let cluster = scope.cluster.as_ref().is_none_or(|c| *c == key.cluster);
        let namespace = !self.namespaced || scope.namespace.as_ref().is_none_or(|ns| *ns == key.namespace);
        cluster && namespace
    }

    /// Objects are returned in the version the request asked for.
    fn versioned(&self, mut object: Value) -> Value {
        if let Some(map) = object.as_object_mut() {
            map.insert("kind".to_string(), Value::String(self.kind.kind.clone()));
            map.insert(
                "apiVersion".to_string(),
                Value::String(self.kind.group_version().to_string()),
            );
        }
        object
    }
}

#[async_trait]
impl ResourceStorage for InMemoryResourceStorage {
    async fn get(&self, scope: &StorageScope, name: &str) -> Result<Value, StorageError> {
        self.store
            .get(&self.resource)
            .and_then(|objects| {
                objects
                    .iter()
                    .find(|(key, _)| key.name == name && self.in_scope(key, scope))
                    .map(|(_, object)| object.clone())
            })
            .map(|object| self.versioned(object))
            .ok_or_else(|| StorageError::not_found(self.resource.to_string(), name))
    }

    async fn list(
        &self,
        scope: &StorageScope,
        options: &ListOptions,
    ) -> Result<Vec<Value>, StorageError> {
        let fields = parse_selector(options.field_selector.as_deref())?;
        let labels = parse_selector(options.label_selector.as_deref())?;

        let Some(objects) = self.store.get(&self.resource) else {
            return Ok(Vec::new());
        };
        let items = objects
            .iter()
            .filter(|(key, _)| self.in_scope(key, scope))
            .filter(|(_, object)| {
                fields.iter().all(|(field, value)| {
                    let pointer = format!("/{}", field.replace('.', "/"));
                    object.pointer(&pointer).and_then(Value::as_str) == Some(*value)
                })
            })
            .filter(|(_, object)| {
                labels.iter().all(|(label, value)| {
                    object
                        .pointer("/metadata/labels")
                        .and_then(|l| l.get(*label))
                        .and_then(Value::as_str)
                        == Some(*value)
                })
            })
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|(_, object)| self.versioned(object.clone()))
            .collect();
        Ok(items)
    }
}

/// Parse `a=b,c==d` equality selectors.
fn parse_selector(selector: Option<&str>) -> Result<Vec<(&str, &str)>, StorageError> {
    let Some(selector) = selector.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };
    selector
        .split(',')
        .map(|requirement| {
            let (key, value) = requirement
                .split_once("==")
                .or_else(|| requirement.split_once('='))
                .ok_or_else(|| StorageError::InvalidSelector(requirement.to_string()))?;
            if key.ends_with('!') {
                return Err(StorageError::InvalidSelector(requirement.to_string()));
            }
            Ok((key.trim(), value.trim()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polycluster_kernel::apis::{GroupVersionResource, extract_cluster_name};

    fn pod(namespace: &str, name: &str, app: &str) -> Value {
        json!({
            "metadata": {"name": name, "namespace": namespace, "labels": {"app": app}},
            "spec": {"nodeName": "n1"}
        })
    }

    fn pods_storage(factory: &InMemoryStorageFactory) -> Arc<dyn ResourceStorage> {
        let gvr = GroupVersionResource::new("", "v1", "pods");
        factory
            .new_resource_storage(&ResourceStorageConfig {
                kind: gvr.group_version().with_kind("Pod"),
                resource: gvr,
                namespaced: true,
                storage_media_type: "application/json".into(),
            })
            .unwrap()
    }

    fn seeded() -> InMemoryStorageFactory {
        let factory = InMemoryStorageFactory::new();
        let pods = GroupResource::new("", "pods");
        factory.insert("east", pods.clone(), pod("default", "web", "web")).unwrap();
        factory.insert("east", pods.clone(), pod("kube-system", "dns", "dns")).unwrap();
        factory.insert("west", pods, pod("default", "web", "web")).unwrap();
        factory
    }

    #[tokio::test]
    async fn get_is_scoped_by_cluster_and_namespace() {
        let factory = seeded();
        let storage = pods_storage(&factory);

        let scope = StorageScope {
            cluster: Some("west".into()),
            namespace: Some("default".into()),
        };
        let web = storage.get(&scope, "web").await.unwrap();
        assert_eq!(extract_cluster_name(&web), "west");
        assert_eq!(web["kind"], "Pod");
        assert_eq!(web["apiVersion"], "v1");

        let err = storage.get(&scope, "dns").await.unwrap_err();
        assert_eq!(err, StorageError::not_found("pods", "dns"));
    }

    #[tokio::test]
    async fn list_filters_and_limits() {
        let factory = seeded();
        let storage = pods_storage(&factory);

        let all = storage.list(&StorageScope::default(), &ListOptions::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let options = ListOptions {
            field_selector: Some("metadata.namespace=default".into()),
            ..Default::default()
        };
        let default_ns = storage.list(&StorageScope::default(), &options).await.unwrap();
        assert_eq!(default_ns.len(), 2);

        let options = ListOptions {
            label_selector: Some("app==dns".into()),
            ..Default::default()
        };
        assert_eq!(storage.list(&StorageScope::default(), &options).await.unwrap().len(), 1);

        let options = ListOptions {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(storage.list(&StorageScope::default(), &options).await.unwrap().len(), 1);

        let options = ListOptions {
            label_selector: Some("app!=dns".into()),
            ..Default::default()
        };
        assert!(matches!(
            storage.list(&StorageScope::default(), &options).await,
            Err(StorageError::InvalidSelector(_))
        ));
    }

    #[test]
    fn remove_cluster_drops_its_objects() {
        let factory = seeded();
        assert_eq!(factory.len(), 3);
        factory.remove_cluster("east");
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn objects_need_a_name() {
        let factory = InMemoryStorageFactory::new();
        let err = factory
            .insert("east", GroupResource::new("", "pods"), json!({"metadata": {}}))
            .unwrap_err();
        assert!(matches!(err, StorageError::Internal(_)));
    }
}
