//! Share backends for the SFS provisioner.
//!
//! A backend translates a share's export location into the volume source
//! the orchestrator mounts. Backends are looked up by the share's protocol:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            BackendRegistry              │
//! │  - protocol name → backend              │
//! │  - filled once, read-only afterwards    │
//! └───────────────────┬─────────────────────┘
//!                     │
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//!   ┌─────────────┐      ┌──────────────┐
//!   │ NfsBackend  │      │  (custom)    │
//!   │   "NFS"     │      │  backends    │
//!   └─────────────┘      └──────────────┘
//! ```

mod nfs;
mod traits;

pub use nfs::*;
pub use traits::*;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, ShareError};

/// Protocol-keyed set of share backends.
///
/// Registration takes `&mut self`, so a registry can only change before it
/// is shared; once wrapped in an `Arc` it is read-only.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn ShareBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Create a registry with the built-in backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NfsBackend::new()));
        registry
    }

    /// Register a backend under its protocol name, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn ShareBackend>) {
        let name = backend.name().to_string();
        debug!(protocol = %name, "Registering share backend");
        self.backends.insert(name, backend);
    }

    /// Find the backend for `protocol`. Matching is exact and case-sensitive.
    pub fn lookup(&self, protocol: &str) -> Result<Arc<dyn ShareBackend>> {
        self.backends
            .get(protocol)
            .cloned()
            .ok_or_else(|| ShareError::BackendNotFound(protocol.to_string()))
    }

    /// Registered protocol names, sorted.
    pub fn protocols(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
