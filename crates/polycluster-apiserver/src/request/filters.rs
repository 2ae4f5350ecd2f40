//! Request filters installed in front of the API handlers.

use super::{CLUSTER_PATH_PREFIX, ClusterName, FieldSelector, RequestInfoResolver};
use crate::error::ApiServerError;
use axum::{
    extract::{Query, Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

const FIELD_SELECTOR: &str = "fieldSelector";

/// Scope requests addressed as `/clusters/{name}/...` to that cluster.
///
/// The prefix is removed from the URI so the handlers see the plain
/// `/api`/`/apis` path, and a [`ClusterName`] extension is attached.
pub async fn with_cluster_path(mut req: Request, next: Next) -> Response {
    let Some(rest) = req.uri().path().strip_prefix(CLUSTER_PATH_PREFIX) else {
        return next.run(req).await;
    };
    let (cluster, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if cluster.is_empty() {
        return next.run(req).await;
    }
    let cluster = cluster.to_string();

    let path_and_query = match req.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    match replace_path_and_query(req.uri(), &path_and_query) {
        Ok(uri) => *req.uri_mut() = uri,
        Err(err) => return err.into_response(),
    }

    debug!(cluster = %cluster, path = %req.uri().path(), "scoped request to cluster");
    req.extensions_mut().insert(ClusterName(cluster));
    next.run(req).await
}

/// Lift `fieldSelector` out of the query string.
///
/// The selector is handed to storage, percent-decoded, through a
/// [`FieldSelector`] extension instead of being interpreted by the generic
/// request path.
pub async fn remove_field_selector(mut req: Request, next: Next) -> Response {
    let Some(query) = req.uri().query() else {
        return next.run(req).await;
    };
    if !query
        .split('&')
        .any(|pair| pair.split_once('=').map_or(pair, |(key, _)| key) == FIELD_SELECTOR)
    {
        return next.run(req).await;
    }

    let selector = match Query::<Vec<(String, String)>>::try_from_uri(req.uri()) {
        Ok(Query(params)) => params
            .into_iter()
            .find_map(|(key, value)| (key == FIELD_SELECTOR).then_some(value))
            .unwrap_or_default(),
        Err(err) => {
            return ApiServerError::Internal(format!("invalid query string: {err}")).into_response();
        }
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| pair.split_once('=').map_or(*pair, |(key, _)| key) != FIELD_SELECTOR)
        .collect();

    let path = req.uri().path();
    let path_and_query = if kept.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", kept.join("&"))
    };
    match replace_path_and_query(req.uri(), &path_and_query) {
        Ok(uri) => *req.uri_mut() = uri,
        Err(err) => return err.into_response(),
    }

    req.extensions_mut().insert(FieldSelector(selector));
    next.run(req).await
}

/// Resolve and attach the [`RequestInfo`](polycluster_kernel::apis::RequestInfo).
pub async fn with_request_info(
    State(resolver): State<Arc<dyn RequestInfoResolver>>,
    mut req: Request,
    next: Next,
) -> Response {
    match resolver.new_request_info(req.method(), req.uri()) {
        Ok(info) => {
            req.extensions_mut().insert(info);
            next.run(req).await
        }
        Err(err) => {
            error!(path = %req.uri().path(), error = %err, "failed to create request info");
            ApiServerError::RequestInfo(err.to_string()).into_response()
        }
    }
}

fn replace_path_and_query(uri: &Uri, path_and_query: &str) -> Result<Uri, ApiServerError> {
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        path_and_query
            .parse()
            .map_err(|e| ApiServerError::Internal(format!("invalid request uri: {e}")))?,
    );
    Uri::from_parts(parts).map_err(|e| ApiServerError::Internal(format!("invalid request uri: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{PathRequestInfoResolver, cluster_name_value};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::StatusCode,
        middleware,
    };
    use polycluster_kernel::apis::RequestInfo;
    use tower::ServiceExt;

    async fn echo(req: Request) -> String {
        let selector = req
            .extensions()
            .get::<FieldSelector>()
            .map(|s| s.0.clone())
            .unwrap_or_default();
        let uri = req.uri().to_string();
        format!("{}|{}|{}", cluster_name_value(req.extensions()), uri, selector)
    }

    async fn call(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn cluster_prefix_is_stripped_and_recorded() {
        let app = Router::new()
            .fallback(echo)
            .layer(middleware::from_fn(with_cluster_path));

        let (_, body) = call(app.clone(), "/clusters/east/apis/apps/v1?limit=1").await;
        assert_eq!(body, "east|/apis/apps/v1?limit=1|");

        let (_, body) = call(app.clone(), "/clusters/east").await;
        assert_eq!(body, "east|/|");

        let (_, body) = call(app, "/apis").await;
        assert_eq!(body, "|/apis|");
    }

    #[tokio::test]
    async fn field_selector_moves_into_extension() {
        let app = Router::new()
            .fallback(echo)
            .layer(middleware::from_fn(remove_field_selector));

        let (_, body) = call(app.clone(), "/api/v1/pods?fieldSelector=metadata.name%3Dweb&limit=5").await;
        assert_eq!(body, "|/api/v1/pods?limit=5|metadata.name=web");

        let (_, body) = call(app, "/api/v1/pods?fieldSelector=spec.nodeName%3Dn1").await;
        assert_eq!(body, "|/api/v1/pods|spec.nodeName=n1");
    }

    #[tokio::test]
    async fn request_info_is_attached_or_rejected() {
        async fn resource(req: Request) -> String {
            req.extensions()
                .get::<RequestInfo>()
                .map(|i| i.resource.clone())
                .unwrap_or_default()
        }
        let resolver: Arc<dyn RequestInfoResolver> = Arc::new(PathRequestInfoResolver::new());
        let app = Router::new()
            .fallback(resource)
            .layer(middleware::from_fn_with_state(resolver, with_request_info));

        let (status, body) = call(app.clone(), "/api/v1/pods").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "pods");

        let (status, _) = call(app, "/api/v1/pods?watch=nope").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
