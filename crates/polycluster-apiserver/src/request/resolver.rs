//! Path → [`RequestInfo`] resolution.

use axum::http::{Method, Uri};
use polycluster_kernel::apis::RequestInfo;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unable to determine kind and namespace from url {0}")]
    InvalidPath(String),

    #[error("invalid value for query parameter '{param}': {value}")]
    InvalidQueryParameter { param: String, value: String },
}

/// Resolves what a request targets.
pub trait RequestInfoResolver: Send + Sync {
    fn new_request_info(&self, method: &Method, uri: &Uri) -> Result<RequestInfo, ResolveError>;
}

/// Kubernetes-style path parser.
///
/// ```text
/// /api/{version}/namespaces/{namespace}/{resource}/{name}/{subresource}
/// /apis/{group}/{version}/{resource}/{name}
/// ```
///
/// Anything shorter than a resource path (`/api`, `/apis/{group}/{version}`)
/// or outside the API prefixes is a non-resource request.
pub struct PathRequestInfoResolver {
    api_prefixes: HashSet<String>,
    grouped_api_prefixes: HashSet<String>,
}

/// Subresources of a namespace that do not make the next path segment a
/// resource in its own right.
const NAMESPACE_SUBRESOURCES: &[&str] = &["status", "finalize"];

impl Default for PathRequestInfoResolver {
    fn default() -> Self {
        Self {
            api_prefixes: ["api", "apis"].into_iter().map(String::from).collect(),
            grouped_api_prefixes: ["apis"].into_iter().map(String::from).collect(),
        }
    }
}

impl PathRequestInfoResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestInfoResolver for PathRequestInfoResolver {
    fn new_request_info(&self, method: &Method, uri: &Uri) -> Result<RequestInfo, ResolveError> {
        let mut info = RequestInfo {
            path: uri.path().to_string(),
            verb: method.as_str().to_lowercase(),
            ..Default::default()
        };

        let mut parts = split_path(uri.path());
        if parts.len() < 3 || !self.api_prefixes.contains(parts[0]) {
            return Ok(info);
        }
        info.api_prefix = parts[0].to_string();
        parts.remove(0);

        if self.grouped_api_prefixes.contains(&info.api_prefix) {
            info.api_group = parts[0].to_string();
            parts.remove(0);
        }
        info.api_version = parts[0].to_string();
        parts.remove(0);

        if parts.is_empty() {
            return Ok(info);
        }
        info.is_resource_request = true;

        info.verb = match *method {
            Method::GET | Method::HEAD => "get",
            Method::POST => "create",
            Method::PUT => "update",
            Method::PATCH => "patch",
            Method::DELETE => "delete",
            _ => "",
        }
        .to_string();

        // legacy /watch/ prefix
        if parts[0] == "watch" && info.verb == "get" {
            if parts.len() < 2 {
                return Err(ResolveError::InvalidPath(uri.to_string()));
            }
            info.verb = "watch".to_string();
            parts.remove(0);
        }

        if parts[0] == "namespaces" && parts.len() > 1 {
            info.namespace = parts[1].to_string();
            if parts.len() > 2 && !NAMESPACE_SUBRESOURCES.contains(&parts[2]) {
                parts.drain(..2);
            }
        }

        info.parts = parts.iter().map(|p| p.to_string()).collect();
        if info.parts.len() >= 3 {
            info.subresource = info.parts[2].clone();
        }
        if info.parts.len() >= 2 {
            info.name = info.parts[1].clone();
        }
        if let Some(resource) = info.parts.first() {
            info.resource = resource.clone();
        }

        if info.name.is_empty() && info.verb == "get" {
            info.verb = if watch_requested(uri)? { "watch" } else { "list" }.to_string();
        }
        if info.name.is_empty() && info.verb == "delete" {
            info.verb = "deletecollection".to_string();
        }

        Ok(info)
    }
}

fn watch_requested(uri: &Uri) -> Result<bool, ResolveError> {
    let Some(query) = uri.query() else {
        return Ok(false);
    };
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != "watch" {
            continue;
        }
        return match value {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(ResolveError::InvalidQueryParameter {
                param: "watch".to_string(),
                value: other.to_string(),
            }),
        };
    }
    Ok(false)
}

/// Split a path into its non-empty segments after trimming slashes.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

/// Wraps a resolver so that requests for the `namespaces` resource are never
/// namespace-scoped.
///
/// `/api/v1/namespaces/foo` parses with namespace `foo`; a namespace object
/// does not live inside a namespace, so the value is cleared before any
/// routing decision reads it.  Errors of the inner resolver pass through
/// untouched.
pub struct NamespaceScopedResolver<R> {
    inner: R,
}

impl<R> NamespaceScopedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: RequestInfoResolver> RequestInfoResolver for NamespaceScopedResolver<R> {
    fn new_request_info(&self, method: &Method, uri: &Uri) -> Result<RequestInfo, ResolveError> {
        let mut info = self.inner.new_request_info(method, uri)?;
        if info.resource == "namespaces" {
            info.namespace.clear();
        }
        Ok(info)
    }
}
