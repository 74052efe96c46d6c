//! # SFS Provisioner
//!
//! Daemon that provisions shared file system shares for storage claims and
//! serves the provision/delete contract over HTTP.

pub mod cli;
pub mod config;
pub mod http_server;
pub mod server;
pub mod vpc;

pub use cli::Args;
pub use config::{Config, ConfigError, DEFAULT_CONFIG_PATH};
