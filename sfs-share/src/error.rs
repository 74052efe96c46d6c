//! Error types for share provisioning.

use std::fmt;

use thiserror::Error;

use crate::types::ShareStatus;

/// Errors produced by the share client, poller, backends and provisioner.
#[derive(Error, Debug)]
pub enum ShareError {
    /// The claim carries a label selector, which cannot be honored.
    #[error("claim Selector is not supported")]
    UnsupportedSelector,

    /// Requested size is missing, zero or negative.
    #[error("{0}")]
    InvalidSize(String),

    /// The control plane rejected the create request.
    #[error("couldn't create share in SFS: {0}")]
    RemoteCreateFailed(String),

    /// The share did not reach the desired status in time.
    #[error(
        "share {share_id} did not reach status '{desired}' within {timeout_secs}s (last observed: {})",
        .last_status.as_ref().map(|s| s.as_str()).unwrap_or("none")
    )]
    StatusTimeout {
        share_id: String,
        desired: ShareStatus,
        last_status: Option<ShareStatus>,
        timeout_secs: u64,
    },

    /// The control plane does not know the requested share.
    #[error("share not found: {0}")]
    RemoteNotFound(String),

    /// Transport-level failure talking to the control plane.
    #[error("SFS control plane unavailable: {0}")]
    RemoteUnavailable(String),

    /// The share has neither a singular nor a listed export location.
    #[error("failed to get share {0} location")]
    NoExportLocation(String),

    /// No backend is registered for the share's protocol.
    #[error("backend {0} not found")]
    BackendNotFound(String),

    /// A backend could not parse the export location.
    #[error("failed to parse address and location from export location '{0}'")]
    MalformedLocation(String),

    /// The access grant was refused.
    #[error("access grant rejected: {0}")]
    RemoteAccessDenied(String),

    /// The descriptor carries no share id annotation.
    #[error("volume has no share id annotation")]
    MissingShareID,

    /// The control plane refused to delete the share.
    #[error("couldn't delete share in SFS: {0}")]
    RemoteDeleteFailed(String),

    /// A wait was abandoned through its cancellation token.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl ShareError {
    /// Stable snake_case identifier for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedSelector => "unsupported_selector",
            Self::InvalidSize(_) => "invalid_size",
            Self::RemoteCreateFailed(_) => "remote_create_failed",
            Self::StatusTimeout { .. } => "status_timeout",
            Self::RemoteNotFound(_) => "remote_not_found",
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::NoExportLocation(_) => "no_export_location",
            Self::BackendNotFound(_) => "backend_not_found",
            Self::MalformedLocation(_) => "malformed_location",
            Self::RemoteAccessDenied(_) => "remote_access_denied",
            Self::MissingShareID => "missing_share_id",
            Self::RemoteDeleteFailed(_) => "remote_delete_failed",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Result type alias for share operations.
pub type Result<T> = std::result::Result<T, ShareError>;

/// Step of a provision or delete attempt, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    CreateShare,
    WaitAvailable,
    GetShare,
    GrantAccess,
    ExportLocation,
    LookupBackend,
    BuildSource,
    DeleteShare,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validate => "invalid claim",
            Self::CreateShare => "failed to create share",
            Self::WaitAvailable => "waiting for share to become available failed",
            Self::GetShare => "failed to get share",
            Self::GrantAccess => "failed to grant access to share",
            Self::ExportLocation => "failed to resolve share location",
            Self::LookupBackend => "failed to get backend",
            Self::BuildSource => "failed to build source from backend",
            Self::DeleteShare => "failed to delete share",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failed provision or delete attempt: the underlying error plus the
/// stage that produced it.
#[derive(Error, Debug)]
#[error("{stage}: {source}")]
pub struct ProvisionError {
    pub stage: Stage,
    #[source]
    pub source: ShareError,
}

impl ProvisionError {
    pub fn new(stage: Stage, source: ShareError) -> Self {
        Self { stage, source }
    }

    /// The underlying error, without the stage label.
    pub fn kind(&self) -> &ShareError {
        &self.source
    }
}
