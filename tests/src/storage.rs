use async_trait::async_trait;
use parking_lot::Mutex;
use polycluster_apiserver::storage::InMemoryStorageFactory;
use polycluster_kernel::apis::{
    GroupVersionResource, ListOptions, ResourceStorage, ResourceStorageConfig, StorageError,
    StorageFactory, StorageScope,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// A storage factory wrapping [`InMemoryStorageFactory`] that records every
/// storage it builds and every call made against those storages.
#[derive(Clone, Default)]
pub struct RecordingStorageFactory {
    inner: InMemoryStorageFactory,
    /// Configurations passed to `new_resource_storage`, in call order.
    pub built: Arc<Mutex<Vec<ResourceStorageConfig>>>,
    /// `(resource, scope, verb)` of every storage call.
    pub calls: Arc<Mutex<Vec<(GroupVersionResource, StorageScope, &'static str)>>>,
}

impl RecordingStorageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The in-memory store storages read from, for seeding objects.
    pub fn store(&self) -> &InMemoryStorageFactory {
        &self.inner
    }

    pub fn built_resources(&self) -> Vec<GroupVersionResource> {
        self.built.lock().iter().map(|c| c.resource.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl StorageFactory for RecordingStorageFactory {
    fn supported_request_verbs(&self) -> Vec<String> {
        self.inner.supported_request_verbs()
    }

    fn new_resource_storage(
        &self,
        config: &ResourceStorageConfig,
    ) -> Result<Arc<dyn ResourceStorage>, StorageError> {
        let storage = self.inner.new_resource_storage(config)?;
        self.built.lock().push(config.clone());
        Ok(Arc::new(RecordingStorage {
            resource: config.resource.clone(),
            inner: storage,
            calls: self.calls.clone(),
        }))
    }

    fn remove_cluster(&self, cluster: &str) {
        self.inner.remove_cluster(cluster);
    }
}

struct RecordingStorage {
    resource: GroupVersionResource,
    inner: Arc<dyn ResourceStorage>,
    calls: Arc<Mutex<Vec<(GroupVersionResource, StorageScope, &'static str)>>>,
}

#[async_trait]
impl ResourceStorage for RecordingStorage {
    async fn get(&self, scope: &StorageScope, name: &str) -> Result<Value, StorageError> {
        self.calls
            .lock()
            .push((self.resource.clone(), scope.clone(), "get"));
        self.inner.get(scope, name).await
    }

    async fn list(
        &self,
        scope: &StorageScope,
        options: &ListOptions,
    ) -> Result<Vec<Value>, StorageError> {
        self.calls
            .lock()
            .push((self.resource.clone(), scope.clone(), "list"));
        self.inner.list(scope, options).await
    }
}

/// A storage factory refusing to build storage for the listed resources,
/// or for every resource when the list is empty.
#[derive(Clone, Default)]
pub struct FailingStorageFactory {
    inner: InMemoryStorageFactory,
    failing: HashSet<String>,
}

impl FailingStorageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail only for `resource` (a plural resource name such as `pods`).
    pub fn failing_on(mut self, resource: &str) -> Self {
        self.failing.insert(resource.to_string());
        self
    }

    fn fails(&self, resource: &GroupVersionResource) -> bool {
        self.failing.is_empty() || self.failing.contains(&resource.resource)
    }
}

impl StorageFactory for FailingStorageFactory {
    fn supported_request_verbs(&self) -> Vec<String> {
        self.inner.supported_request_verbs()
    }

    fn new_resource_storage(
        &self,
        config: &ResourceStorageConfig,
    ) -> Result<Arc<dyn ResourceStorage>, StorageError> {
        if self.fails(&config.resource) {
            return Err(StorageError::Unavailable(format!(
                "no storage for {}",
                config.resource
            )));
        }
        self.inner.new_resource_storage(config)
    }

    fn remove_cluster(&self, cluster: &str) {
        self.inner.remove_cluster(cluster);
    }
}

#[macro_export]
macro_rules! assert_storage_called {
    ($factory:expr, $expected_count:expr) => {
        let count = $factory.call_count();
        assert_eq!(
            count, $expected_count,
            "Expected storage to be called {} times, but was called {} times",
            $expected_count, count
        );
    };
}
