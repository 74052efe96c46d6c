//! # SFS Provisioner Daemon
//!
//! Creates shares on the shared file system service for storage claims and
//! hands back NFS mount descriptors.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use sfs_provisioner::{server, Args, Config, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    sfs_common::init_logging(&args.log_level, args.log_format.parse()?)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting SFS provisioner"
    );

    // Load configuration
    let config = match &args.config {
        Some(config_path) => match Config::load(config_path) {
            Ok(cfg) => {
                info!(config_path = %config_path, "Configuration loaded");
                cfg
            }
            Err(e) => {
                error!(error = %e, path = %config_path, "Failed to load configuration");
                return Err(e);
            }
        },
        None => match Config::load(DEFAULT_CONFIG_PATH) {
            Ok(cfg) => {
                info!(config_path = %DEFAULT_CONFIG_PATH, "Configuration loaded from default location");
                cfg
            }
            Err(_) => {
                info!("No config file found, using CLI arguments and defaults");
                Config::default()
            }
        },
    }
    .with_cli_overrides(&args);

    config.validate(args.dev)?;

    info!(
        listen = %config.server.listen_address,
        provisioner = %config.provisioner.name,
        share_timeout_secs = config.provisioner.share_timeout_secs,
        dev = args.dev,
        "Provisioner configured"
    );

    if let Err(e) = server::run(config, args.dev).await {
        error!(error = %e, "Server failed");
        return Err(e);
    }

    Ok(())
}
