//! Share backend trait definition.

use crate::error::Result;
use crate::types::VolumeSource;

/// Arguments passed to [`ShareBackend::build_source`].
#[derive(Debug, Clone)]
pub struct BuildSourceArgs {
    /// Export location reported by the control plane
    pub location: String,
}

impl BuildSourceArgs {
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into() }
    }
}

/// Share backend trait - implemented by each share protocol.
///
/// The backend registry routes a share to its backend by protocol name.
/// Backends are pure: they only translate an export location into the
/// volume source the orchestrator mounts.
pub trait ShareBackend: Send + Sync {
    /// Protocol this backend handles, matched exactly against the share's
    /// protocol (e.g. "NFS").
    fn name(&self) -> &str;

    /// Turn an export location into a mountable volume source.
    ///
    /// Called during provisioning; the result ends up in the returned
    /// volume descriptor.
    fn build_source(&self, args: &BuildSourceArgs) -> Result<VolumeSource>;
}
