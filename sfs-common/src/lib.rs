//! # sfs-common
//!
//! Shared utilities for the SFS provisioner components.
//!
//! ## Logging
//!
//! ```rust,ignore
//! use sfs_common::{init_logging, LogFormat};
//!
//! init_logging("info", LogFormat::Pretty).unwrap();
//! tracing::info!(share_id = "s1", "Share available");
//! ```

pub mod logging;

pub use logging::{init_logging, init_logging_json, init_logging_pretty, LogFormat};
