//! `polycluster-apiserver` — aggregated discovery and resource routing
//! across many clusters.
//!
//! This crate provides the concrete implementations of the contracts
//! defined in `polycluster-kernel::apis`:
//!
//! | Kernel contract | Implementation |
//! |----------------|----------------|
//! | [`CatalogSource`] | [`restmanager::RestManager`] |
//! | [`ResourceScheme`] | [`restmanager::BuiltinResourceScheme`] |
//! | [`StorageFactory`] | [`storage::InMemoryStorageFactory`] |
//! | [`Serializer`] | [`negotiation::JsonSerializer`] |
//!
//! The [`server::ApiServer`] wires everything together into an axum HTTP
//! service.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use polycluster_apiserver::config::ApiServerConfig;
//! use polycluster_apiserver::inventory::builtin_inventory;
//! use polycluster_apiserver::server::ApiServer;
//! use polycluster_apiserver::storage::InMemoryStorageFactory;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ApiServer::new(
//!         ApiServerConfig::default(),
//!         Arc::new(InMemoryStorageFactory::new()),
//!         &builtin_inventory(),
//!     );
//!     server.set_cluster_resources("east", &builtin_inventory());
//!     server.start().await.unwrap();
//! }
//! ```
//!
//! [`CatalogSource`]: polycluster_kernel::apis::CatalogSource
//! [`ResourceScheme`]: polycluster_kernel::apis::ResourceScheme
//! [`StorageFactory`]: polycluster_kernel::apis::StorageFactory
//! [`Serializer`]: polycluster_kernel::apis::Serializer

pub mod config;
pub mod discovery;
pub mod error;
pub mod inventory;
pub mod negotiation;
pub mod request;
pub mod resource_handler;
pub mod restmanager;
pub mod server;
pub mod storage;

// Re-export the kernel API types for convenience.
pub use polycluster_kernel::apis;
