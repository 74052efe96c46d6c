//! Daemon setup and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sfs_share::{
    BackendRegistry, HttpShareApi, MockShareApi, Provisioner, ShareApi, ShareClient,
};

use crate::config::Config;
use crate::http_server::{build_router, AppState};
use crate::vpc::resolve_vpc_id;

/// Build the provisioner from configuration.
pub async fn build_provisioner(config: &Config, dev: bool) -> Result<Provisioner> {
    let api: Arc<dyn ShareApi> = if dev {
        info!("Using in-memory SFS API (development mode)");
        Arc::new(MockShareApi::new())
    } else {
        let api = HttpShareApi::new(config.share_api_config()?)?;
        info!(endpoint = %api.endpoint(), "Using SFS API");
        Arc::new(api)
    };

    let fallback_network_id = if dev {
        config.network.vpc_id.clone()
    } else {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.cloud.request_timeout_secs))
            .danger_accept_invalid_certs(config.cloud.insecure)
            .build()?;
        resolve_vpc_id(config, &http_client).await
    };

    let backends = Arc::new(BackendRegistry::with_defaults());
    info!(protocols = ?backends.protocols(), "Share backends registered");

    Ok(Provisioner::new(
        ShareClient::new(api),
        backends,
        config.provisioner_config(),
        fallback_network_id,
    ))
}

/// Run the HTTP API until interrupted.
pub async fn run(config: Config, dev: bool) -> Result<()> {
    let provisioner = build_provisioner(&config, dev).await?;

    let addr: SocketAddr = config
        .server
        .listen_address
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        provisioner: Arc::new(provisioner),
        shutdown: shutdown.clone(),
    });
    let app = build_router(state);

    info!(
        address = %addr,
        provisioner = %config.provisioner.name,
        "Starting HTTP API"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    info!("HTTP API stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
