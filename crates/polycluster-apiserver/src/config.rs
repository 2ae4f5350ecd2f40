//! Server configuration.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `POLYCLUSTER_BIND_ADDRESS` | `0.0.0.0` | Address to listen on. |
//! | `POLYCLUSTER_PORT` | `8443` | TCP port to listen on. |
//! | `POLYCLUSTER_INVENTORY` | *(built-in)* | JSON file with the initial resource inventory. |
//! | `POLYCLUSTER_CLUSTERS` | *(none)* | JSON file with cluster catalogs to load at startup. |
//! | `POLYCLUSTER_STORAGE_MEDIA_TYPE` | `application/json` | Media type handed to storage. |
//! | `POLYCLUSTER_PRETTY_JSON` | `false` | Indent JSON responses. |

use crate::restmanager::DEFAULT_STORAGE_MEDIA_TYPE;
use polycluster_kernel::apis::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to seed objects of cluster {cluster}: {source}")]
    Seed {
        cluster: String,
        #[source]
        source: StorageError,
    },
}

/// Runtime configuration for [`ApiServer`](crate::server::ApiServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Initial resource inventory; the built-in inventory when unset.
    pub inventory_path: Option<PathBuf>,
    /// Cluster catalogs loaded at startup.
    pub clusters_path: Option<PathBuf>,
    pub storage_media_type: String,
    pub pretty_json: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8443,
            inventory_path: None,
            clusters_path: None,
            storage_media_type: DEFAULT_STORAGE_MEDIA_TYPE.to_string(),
            pretty_json: false,
        }
    }
}

impl ApiServerConfig {
    /// Read the `POLYCLUSTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a configuration from any variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(addr) = var("POLYCLUSTER_BIND_ADDRESS") {
            config.bind_address = addr;
        }
        if let Some(port) = var("POLYCLUSTER_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "POLYCLUSTER_PORT",
                value: port.clone(),
            })?;
        }
        config.inventory_path = var("POLYCLUSTER_INVENTORY").map(PathBuf::from);
        config.clusters_path = var("POLYCLUSTER_CLUSTERS").map(PathBuf::from);
        if let Some(media_type) = var("POLYCLUSTER_STORAGE_MEDIA_TYPE") {
            config.storage_media_type = media_type;
        }
        if let Some(pretty) = var("POLYCLUSTER_PRETTY_JSON") {
            config.pretty_json = match pretty.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "POLYCLUSTER_PRETTY_JSON",
                        value: pretty,
                    });
                }
            };
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
