//! Parsed request identity.

use super::meta::GroupVersionResource;
use serde::{Deserialize, Serialize};

/// What an inbound request targets, as resolved from its path and method.
///
/// Non-resource requests (discovery documents, health probes) only carry
/// `path` and `verb`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub is_resource_request: bool,
    pub path: String,
    /// Lowercase verb: `get`, `list`, `watch`, `create`, `update`, `patch`,
    /// `delete`, or the lowercased HTTP method for non-resource requests.
    pub verb: String,
    pub api_prefix: String,
    pub api_group: String,
    pub api_version: String,
    pub namespace: String,
    pub resource: String,
    pub subresource: String,
    pub name: String,
    pub parts: Vec<String>,
}

impl RequestInfo {
    pub fn group_version_resource(&self) -> GroupVersionResource {
        GroupVersionResource::new(&self.api_group, &self.api_version, &self.resource)
    }
}
