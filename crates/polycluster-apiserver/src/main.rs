//! Polycluster API server — entry point.
//!
//! Reads configuration from `POLYCLUSTER_*` environment variables (see
//! [`polycluster_apiserver::config`]) and starts the axum-based HTTP
//! service over in-memory storage.

use polycluster_apiserver::config::ApiServerConfig;
use polycluster_apiserver::server::ApiServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialise structured logging.
    let directive = match "polycluster_apiserver=info".parse() {
        Ok(directive) => directive,
        Err(e) => {
            eprintln!("invalid log directive: {e}");
            std::process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let config = match ApiServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!(
        addr = %config.listen_addr(),
        inventory = ?config.inventory_path,
        clusters = ?config.clusters_path,
        "polycluster apiserver configuration loaded"
    );

    let server = match ApiServer::from_config(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        eprintln!("API server error: {e}");
        std::process::exit(1);
    }
}
