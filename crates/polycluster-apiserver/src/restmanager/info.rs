//! Resource bindings.

use super::table::TableConvertor;
use polycluster_kernel::apis::{
    ApiResource, GroupVersionKind, GroupVersionResource, ResourceStorage, Serializer,
};
use std::fmt;
use std::sync::Arc;

/// Everything a request handler needs to answer for one resource.
pub struct RequestScope {
    pub resource: GroupVersionResource,
    pub kind: GroupVersionKind,
    pub namespaced: bool,
    pub serializer: Arc<dyn Serializer>,
    pub table_convertor: TableConvertor,
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("resource", &self.resource)
            .field("kind", &self.kind)
            .field("namespaced", &self.namespaced)
            .field("table_convertor", &self.table_convertor)
            .finish_non_exhaustive()
    }
}

/// Binding of one `GroupVersionResource`.
///
/// A binding goes from registered (metadata only) to wired (scope and
/// storage attached).  Only a wired binding serves requests; anything else
/// is [empty](RestResourceInfo::is_empty), including the default value
/// returned for an unknown resource.
#[derive(Clone, Default)]
pub struct RestResourceInfo {
    pub api_resource: ApiResource,
    pub request_scope: Option<Arc<RequestScope>>,
    pub storage: Option<Arc<dyn ResourceStorage>>,
}

impl RestResourceInfo {
    pub fn registered(api_resource: ApiResource) -> Self {
        Self {
            api_resource,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_resource.name.is_empty() || self.request_scope.is_none() || self.storage.is_none()
    }

    /// Registered but not wired.
    pub fn is_registered_only(&self) -> bool {
        !self.api_resource.name.is_empty() && self.is_empty()
    }
}

impl fmt::Debug for RestResourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestResourceInfo")
            .field("api_resource", &self.api_resource)
            .field("request_scope", &self.request_scope)
            .field("storage", &self.storage.as_ref().map(|_| "<storage>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binding_is_empty() {
        let info = RestResourceInfo::default();
        assert!(info.is_empty());
        assert!(!info.is_registered_only());
    }

    #[test]
    fn registered_binding_is_empty_until_wired() {
        let info = RestResourceInfo::registered(ApiResource::new("pods", "Pod", true));
        assert!(info.is_empty());
        assert!(info.is_registered_only());
    }
}
