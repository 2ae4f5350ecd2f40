//! Axum-based API server.
//!
//! [`ApiServer`] wires the resource registry, the discovery manager and the
//! request filter chain into a running axum service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/healthz`, `/livez` | Liveness check, always `200 OK`. |
//! | `GET`  | `/readyz` | Readiness check with the number of known clusters. |
//! | `ANY`  | `/api/...`, `/apis/...` | Discovery and resource requests over all clusters. |
//! | `ANY`  | `/clusters/{name}/api/...` | The same, scoped to one cluster. |

use crate::config::{ApiServerConfig, ConfigError};
use crate::discovery::DiscoveryManager;
use crate::error::ApiServerError;
use crate::inventory::{ClusterCatalog, builtin_inventory, load_cluster_catalogs, load_inventory};
use crate::negotiation::JsonSerializer;
use crate::request::{
    NamespaceScopedResolver, PathRequestInfoResolver, RequestInfoResolver, remove_field_selector,
    with_cluster_path, with_request_info,
};
use crate::resource_handler::ResourceHandler;
use crate::restmanager::{BuiltinResourceScheme, RestManager};
use crate::storage::InMemoryStorageFactory;
use axum::{
    Json, Router,
    extract::{Request, State},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use polycluster_kernel::apis::{
    ApiGroupResources, ResourceScheme, Serializer, StorageFactory,
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info};

// ─────────────────────────────────────────────────────────────────────────────
// Shared application state
// ─────────────────────────────────────────────────────────────────────────────

/// Shared state injected into every axum handler via [`State`] extractor.
#[derive(Clone)]
struct AppState {
    handler: Arc<ResourceHandler>,
    discovery: Arc<DiscoveryManager>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ApiServer
// ─────────────────────────────────────────────────────────────────────────────

pub struct ApiServer {
    config: ApiServerConfig,
    rest_manager: Arc<RestManager>,
    discovery: Arc<DiscoveryManager>,
    handler: Arc<ResourceHandler>,
    resolver: Arc<dyn RequestInfoResolver>,
}

impl ApiServer {
    /// Create a server over `storage_factory`, serving the built-in scheme.
    pub fn new(
        config: ApiServerConfig,
        storage_factory: Arc<dyn StorageFactory>,
        initial: &[ApiGroupResources],
    ) -> Self {
        Self::with_scheme(
            config,
            storage_factory,
            Arc::new(BuiltinResourceScheme::new()),
            initial,
        )
    }

    pub fn with_scheme(
        config: ApiServerConfig,
        storage_factory: Arc<dyn StorageFactory>,
        scheme: Arc<dyn ResourceScheme>,
        initial: &[ApiGroupResources],
    ) -> Self {
        let serializer: Arc<dyn Serializer> =
            Arc::new(JsonSerializer::new().pretty(config.pretty_json));
        let rest_manager = Arc::new(
            RestManager::new(serializer.clone(), storage_factory, scheme, initial)
                .with_storage_media_type(config.storage_media_type.clone()),
        );

        let delegate = not_found_delegate();
        let discovery = Arc::new(DiscoveryManager::new(
            serializer,
            rest_manager.clone(),
            delegate.clone(),
        ));
        let handler = Arc::new(ResourceHandler::new(
            discovery.clone(),
            rest_manager.clone(),
            delegate,
        ));

        Self {
            config,
            rest_manager,
            discovery,
            handler,
            resolver: Arc::new(NamespaceScopedResolver::new(PathRequestInfoResolver::new())),
        }
    }

    /// Build a server backed by in-memory storage from `config`: the
    /// inventory file (or the built-in inventory) seeds the registry and
    /// every catalog in the clusters file is loaded.
    pub fn from_config(config: ApiServerConfig) -> Result<Self, ConfigError> {
        let initial = match &config.inventory_path {
            Some(path) => load_inventory(path)?,
            None => builtin_inventory(),
        };
        let catalogs = match &config.clusters_path {
            Some(path) => load_cluster_catalogs(path)?,
            None => Vec::new(),
        };

        let storage = InMemoryStorageFactory::new();
        let server = Self::new(config, Arc::new(storage.clone()), &initial);
        for catalog in &catalogs {
            server.load_cluster_catalog(&storage, catalog)?;
        }
        Ok(server)
    }

    /// Seed `catalog`'s objects into `storage` and publish its resources.
    pub fn load_cluster_catalog(
        &self,
        storage: &InMemoryStorageFactory,
        catalog: &ClusterCatalog,
    ) -> Result<(), ConfigError> {
        for seed in &catalog.objects {
            storage
                .insert(&catalog.name, seed.group_resource(), seed.object.clone())
                .map_err(|source| ConfigError::Seed {
                    cluster: catalog.name.clone(),
                    source,
                })?;
        }
        self.set_cluster_resources(&catalog.name, &catalog.resources);
        Ok(())
    }

    /// Replace what `cluster` serves.
    ///
    /// The inventory is first loaded into the registry, which wires storage
    /// for new resources; discovery is published afterwards so a resource is
    /// never discoverable before it has a binding.
    pub fn set_cluster_resources(&self, cluster: &str, inventory: &[ApiGroupResources]) {
        let apis = self.rest_manager.load_resources(inventory);
        self.discovery.set_cluster_group_resource(cluster, apis);
    }

    /// Forget `cluster`: its discovery tables are dropped first, then its
    /// objects are purged from storage so unscoped requests stop returning
    /// them.
    pub fn remove_cluster(&self, cluster: &str) {
        self.discovery.remove_cluster(cluster);
        self.rest_manager.remove_cluster(cluster);
    }

    pub fn config(&self) -> &ApiServerConfig {
        &self.config
    }

    pub fn rest_manager(&self) -> &Arc<RestManager> {
        &self.rest_manager
    }

    pub fn discovery(&self) -> &Arc<DiscoveryManager> {
        &self.discovery
    }

    /// Build the axum [`Router`].
    ///
    /// API traffic is served from the fallback so the filters below may
    /// rewrite the path before the request is resolved.  Filters run
    /// outermost first: tracing, cluster path, field selector, panic
    /// recovery, request info.
    pub fn build_app(&self) -> Router {
        let state = AppState {
            handler: self.handler.clone(),
            discovery: self.discovery.clone(),
        };

        Router::new()
            .route("/healthz", get(healthz))
            .route("/livez", get(healthz))
            .route("/readyz", get(readyz))
            .fallback(serve_api)
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                self.resolver.clone(),
                with_request_info,
            ))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(remove_field_selector))
            .layer(middleware::from_fn(with_cluster_path))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind to the configured address and serve until the process exits.
    pub async fn start(self) -> std::io::Result<()> {
        let app = self.build_app();
        let addr = self.config.listen_addr();
        info!(
            addr = %addr,
            clusters = self.discovery.clusters().len(),
            "polycluster apiserver starting"
        );
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }
}

/// Requests nothing else answers end here.
fn not_found_delegate() -> Router {
    Router::new().fallback(|| async { ApiServerError::NotFound.into_response() })
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn serve_api(State(state): State<AppState>, req: Request) -> Response {
    state.handler.serve(req).await
}

/// `GET /healthz`, `GET /livez`
async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "polycluster-apiserver" }))
}

/// `GET /readyz`
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "clusters": state.discovery.clusters().len(),
    }))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "request handler panicked");
    ApiServerError::Internal(detail).into_response()
}
