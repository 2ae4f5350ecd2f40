//! Entry handler for `/api` and `/apis` traffic.
//!
//! Non-resource requests (the discovery family) go to the
//! [`DiscoveryManager`].  Resource requests are checked against the
//! discovery tables of the request's cluster, resolved to a binding through
//! the [`RestManager`] and executed against the bound storage.

use crate::discovery::{DiscoveryManager, serve_delegate};
use crate::error::{ApiServerError, ApiServerResult};
use crate::negotiation::{write_object_negotiated, write_typed_negotiated};
use crate::request::{FieldSelector, cluster_name_value};
use crate::restmanager::table::{TABLE_API_VERSION, TABLE_KIND};
use crate::restmanager::{RequestScope, RestManager};
use axum::{
    Router,
    extract::{Query, Request},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use polycluster_kernel::apis::{
    ListOptions, Object, RequestInfo, ResourceStorage, StorageScope,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct ResourceHandler {
    discovery: Arc<DiscoveryManager>,
    rest_manager: Arc<RestManager>,
    delegate: Router,
}

impl ResourceHandler {
    pub fn new(
        discovery: Arc<DiscoveryManager>,
        rest_manager: Arc<RestManager>,
        delegate: Router,
    ) -> Self {
        Self {
            discovery,
            rest_manager,
            delegate,
        }
    }

    pub async fn serve(&self, req: Request) -> Response {
        let Some(info) = req.extensions().get::<RequestInfo>().cloned() else {
            error!(path = %req.uri().path(), "no request info in request extensions");
            return ApiServerError::RequestInfo("no RequestInfo found in the context".to_string())
                .into_response();
        };
        if !info.is_resource_request {
            return self.discovery.serve(req).await;
        }

        let gvr = info.group_version_resource();
        let cluster = cluster_name_value(req.extensions()).to_string();
        if !info.subresource.is_empty() || !self.discovery.resource_enabled(&cluster, &gvr) {
            debug!(cluster = %cluster, resource = %gvr, "resource not served");
            return serve_delegate(&self.delegate, req).await;
        }

        let binding = self.rest_manager.rest_resource_info(&gvr);
        let (Some(scope), Some(storage)) = (binding.request_scope.clone(), binding.storage.clone())
        else {
            warn!(resource = %gvr, "resource is discoverable but not wired");
            return ApiServerError::NotWired(gvr.to_string()).into_response();
        };
        if !binding.api_resource.verbs.contains(&info.verb) {
            return ApiServerError::MethodNotSupported {
                verb: info.verb,
                resource: binding.api_resource.kind,
            }
            .into_response();
        }

        let (parts, _body) = req.into_parts();
        let request = ResourceRequest {
            info: &info,
            cluster: &cluster,
            parts: &parts,
        };
        match request.execute(&scope, storage.as_ref()).await {
            Ok(resp) => resp,
            Err(err) => err.into_response(),
        }
    }
}

/// One resource request being executed.
struct ResourceRequest<'a> {
    info: &'a RequestInfo,
    cluster: &'a str,
    parts: &'a Parts,
}

impl ResourceRequest<'_> {
    async fn execute(
        &self,
        scope: &RequestScope,
        storage: &dyn ResourceStorage,
    ) -> ApiServerResult<Response> {
        let storage_scope = StorageScope {
            cluster: (!self.cluster.is_empty()).then(|| self.cluster.to_string()),
            namespace: (scope.namespaced && !self.info.namespace.is_empty())
                .then(|| self.info.namespace.clone()),
        };

        match self.info.verb.as_str() {
            "get" => {
                let object = storage.get(&storage_scope, &self.info.name).await?;
                if self.wants_table() {
                    return Ok(self.write_table(scope, &[object]));
                }
                Ok(write_object_negotiated(
                    scope.serializer.as_ref(),
                    StatusCode::OK,
                    &Object::from_value(object),
                    &self.parts.headers,
                ))
            }
            "list" => {
                let options = self.list_options()?;
                let items = storage.list(&storage_scope, &options).await?;
                if self.wants_table() {
                    return Ok(self.write_table(scope, &items));
                }
                let list = json!({
                    "metadata": {},
                    "items": items,
                });
                Ok(write_typed_negotiated(
                    scope.serializer.as_ref(),
                    StatusCode::OK,
                    &format!("{}List", scope.kind.kind),
                    &scope.kind.group_version().to_string(),
                    &list,
                    &self.parts.headers,
                ))
            }
            verb => Err(ApiServerError::MethodNotSupported {
                verb: verb.to_string(),
                resource: scope.kind.kind.clone(),
            }),
        }
    }

    fn list_options(&self) -> ApiServerResult<ListOptions> {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(&self.parts.uri)
            .map_err(|e| ApiServerError::BadRequest(e.to_string()))?;
        let limit = params
            .get("limit")
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| ApiServerError::BadRequest(format!("invalid limit '{v}'")))
            })
            .transpose()?
            .filter(|limit| *limit > 0);

        Ok(ListOptions {
            label_selector: params.get("labelSelector").cloned(),
            field_selector: self
                .parts
                .extensions
                .get::<FieldSelector>()
                .map(|s| s.0.clone()),
            limit,
        })
    }

    /// `Accept: application/json;as=Table;v=v1;g=meta.k8s.io`
    fn wants_table(&self) -> bool {
        self.parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| {
                accept
                    .split(',')
                    .any(|range| range.split(';').any(|param| param.trim() == "as=Table"))
            })
    }

    fn write_table(&self, scope: &RequestScope, objects: &[Value]) -> Response {
        let table = scope
            .table_convertor
            .convert_to_table(objects, self.cluster.is_empty());
        write_typed_negotiated(
            scope.serializer.as_ref(),
            StatusCode::OK,
            TABLE_KIND,
            TABLE_API_VERSION,
            &table,
            &self.parts.headers,
        )
    }
}
