//! Command-line argument parsing.

use clap::Parser;

/// SFS share provisioner - creates network file shares for storage claims
#[derive(Parser, Debug, Default)]
#[command(name = "sfs-provisioner")]
#[command(about = "SFS share provisioner - creates network file shares for storage claims")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long, env = "SFS_PROVISIONER_CONFIG")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Log output format (pretty, json)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Name of the provisioner; only claims whose storage class names this
    /// provisioner are served
    #[arg(long)]
    pub provisioner: Option<String>,

    /// Share operation timeout in seconds
    #[arg(long)]
    pub share_timeout: Option<u64>,

    /// Listen address for the HTTP API
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable development mode (in-memory SFS API)
    #[arg(long)]
    pub dev: bool,
}
