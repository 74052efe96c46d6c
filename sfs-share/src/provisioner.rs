//! Provisioning orchestrator.
//!
//! Drives one attempt through
//! `Requested → Creating → Waiting → AccessGranting → Resolving → Done`.
//! Any failure moves the attempt to `Failed` and is returned as-is; nothing
//! is retried and a share created by a failed attempt is left on the remote
//! side for external cleanup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backends::{BuildSourceArgs, BackendRegistry};
use crate::error::{ProvisionError, ShareError, Stage};
use crate::poller::{wait_for_status, PollSettings};
use crate::share::{access_target, ShareClient};
use crate::types::{
    ShareStatus, VolumeDescriptor, VolumeRequest, PROVISIONED_BY_ANNOTATION, SHARE_ID_ANNOTATION,
};

/// Default provisioner name, as referenced by storage classes.
pub const DEFAULT_PROVISIONER_NAME: &str = "external.k8s.io/sfs";

/// Process-wide provisioner settings.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Name stamped on provisioned volumes
    pub provisioner_name: String,
    /// Bounded wait for shares to become available
    pub poll: PollSettings,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            provisioner_name: DEFAULT_PROVISIONER_NAME.to_string(),
            poll: PollSettings::default(),
        }
    }
}

/// State of a single provisioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Requested,
    Creating,
    Waiting,
    AccessGranting,
    Resolving,
    Done,
    Failed,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Creating => "creating",
            Self::Waiting => "waiting",
            Self::AccessGranting => "access_granting",
            Self::Resolving => "resolving",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the state of one attempt and labels its failures.
struct Attempt {
    state: ProvisionState,
}

impl Attempt {
    fn new() -> Self {
        Self { state: ProvisionState::Requested }
    }

    fn advance(&mut self, next: ProvisionState) {
        debug!(from = %self.state, to = %next, "Provision state transition");
        self.state = next;
    }

    fn fail(&mut self, stage: Stage, source: ShareError) -> ProvisionError {
        warn!(state = %self.state, stage = ?stage, error = %source, "Provision attempt failed");
        self.state = ProvisionState::Failed;
        ProvisionError::new(stage, source)
    }
}

/// Creates shares for volume requests and deletes them again.
///
/// Safe to share between concurrent requests: it holds no per-request
/// state.
pub struct Provisioner {
    client: ShareClient,
    backends: Arc<BackendRegistry>,
    config: ProvisionerConfig,
    /// Network granted access when a request names none. May be empty.
    fallback_network_id: String,
}

impl Provisioner {
    pub fn new(
        client: ShareClient,
        backends: Arc<BackendRegistry>,
        config: ProvisionerConfig,
        fallback_network_id: impl Into<String>,
    ) -> Self {
        let fallback_network_id = fallback_network_id.into();
        if fallback_network_id.is_empty() {
            warn!("No fallback network id; requests without a vpcid parameter grant access to an empty target");
        }

        Self {
            client,
            backends,
            config,
            fallback_network_id,
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn fallback_network_id(&self) -> &str {
        &self.fallback_network_id
    }

    /// Provision a share for `request` and describe how to mount it.
    pub async fn provision(&self, request: &VolumeRequest) -> Result<VolumeDescriptor, ProvisionError> {
        self.run_provision(request, None).await
    }

    /// Like [`Provisioner::provision`], but the readiness wait ends early
    /// when `cancel` fires.
    pub async fn provision_with_cancel(
        &self,
        request: &VolumeRequest,
        cancel: &CancellationToken,
    ) -> Result<VolumeDescriptor, ProvisionError> {
        self.run_provision(request, Some(cancel)).await
    }

    #[instrument(skip(self, request, cancel), fields(volume = %request.name, claim = %request.claim.name))]
    async fn run_provision(
        &self,
        request: &VolumeRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<VolumeDescriptor, ProvisionError> {
        let mut attempt = Attempt::new();

        if request.selector.is_some() {
            return Err(attempt.fail(Stage::Validate, ShareError::UnsupportedSelector));
        }
        let size_gb = validate_size(request.size_gb)
            .map_err(|e| attempt.fail(Stage::Validate, e))?;

        attempt.advance(ProvisionState::Creating);
        let created = self
            .client
            .create_share(request, size_gb)
            .await
            .map_err(|e| attempt.fail(Stage::CreateShare, e))?;

        attempt.advance(ProvisionState::Waiting);
        wait_for_status(&self.client, &created.id, &ShareStatus::Available, &self.config.poll, cancel)
            .await
            .map_err(|e| attempt.fail(Stage::WaitAvailable, e))?;

        // The create response may not carry export locations yet.
        let share = self
            .client
            .get_share(&created.id)
            .await
            .map_err(|e| attempt.fail(Stage::GetShare, e))?;

        attempt.advance(ProvisionState::AccessGranting);
        let target = access_target(request, &self.fallback_network_id);
        self.client
            .grant_access(&share.id, target)
            .await
            .map_err(|e| attempt.fail(Stage::GrantAccess, e))?;

        attempt.advance(ProvisionState::Resolving);
        let location = share
            .mount_location()
            .ok_or_else(|| ShareError::NoExportLocation(share.id.clone()))
            .map_err(|e| attempt.fail(Stage::ExportLocation, e))?;
        info!(share_id = %share.id, location = %location, "Resolved share location");

        let backend = self
            .backends
            .lookup(&share.share_proto)
            .map_err(|e| attempt.fail(Stage::LookupBackend, e))?;
        let source = backend
            .build_source(&BuildSourceArgs::new(location))
            .map_err(|e| attempt.fail(Stage::BuildSource, e))?;

        let mut annotations = BTreeMap::new();
        annotations.insert(SHARE_ID_ANNOTATION.to_string(), share.id.clone());
        annotations.insert(
            PROVISIONED_BY_ANNOTATION.to_string(),
            self.config.provisioner_name.clone(),
        );

        attempt.advance(ProvisionState::Done);
        info!(share_id = %share.id, protocol = %share.share_proto, "Volume provisioned");

        Ok(VolumeDescriptor {
            name: request.name.clone(),
            capacity_gb: size_gb,
            reclaim_policy: request.reclaim_policy,
            access_modes: request.access_modes.clone(),
            source,
            annotations,
        })
    }

    /// Delete the share behind a previously provisioned volume.
    #[instrument(skip(self, descriptor), fields(volume = %descriptor.name))]
    pub async fn delete(&self, descriptor: &VolumeDescriptor) -> Result<(), ProvisionError> {
        let share_id = descriptor
            .share_id()
            .ok_or_else(|| ProvisionError::new(Stage::DeleteShare, ShareError::MissingShareID))?;

        self.client
            .delete_share(share_id)
            .await
            .map_err(|e| ProvisionError::new(Stage::DeleteShare, e))?;

        info!(share_id = %share_id, "Volume deleted");
        Ok(())
    }
}

/// Check a requested size in GB and convert it for the create call.
pub fn validate_size(size_gb: Option<i64>) -> Result<u64, ShareError> {
    match size_gb {
        None => Err(ShareError::InvalidSize(
            "requested storage capacity must be set".to_string(),
        )),
        Some(0) => Err(ShareError::InvalidSize(
            "requested storage size must not have zero value".to_string(),
        )),
        Some(size) if size < 0 => Err(ShareError::InvalidSize(
            "requested storage size must be greater than zero".to_string(),
        )),
        Some(size) => Ok(size as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockShareApi;
    use crate::types::{LabelSelector, NfsVolumeSource, VolumeSource};
    use std::time::Duration;

    fn provisioner(api: Arc<MockShareApi>, fallback: &str) -> Provisioner {
        let config = ProvisionerConfig {
            provisioner_name: "test-provisioner".to_string(),
            poll: PollSettings::new(Duration::from_secs(30), Duration::from_secs(2)),
        };
        Provisioner::new(
            ShareClient::new(api),
            Arc::new(BackendRegistry::with_defaults()),
            config,
            fallback,
        )
    }

    #[test]
    fn test_validate_size() {
        assert_eq!(validate_size(Some(5)).unwrap(), 5);
        assert!(matches!(validate_size(None), Err(ShareError::InvalidSize(_))));
        assert!(matches!(validate_size(Some(0)), Err(ShareError::InvalidSize(_))));
        assert!(matches!(validate_size(Some(-3)), Err(ShareError::InvalidSize(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provision_happy_path() {
        let api = Arc::new(MockShareApi::new().with_ready_after(2));
        let provisioner = provisioner(api.clone(), "vpc-default");

        let request = VolumeRequest::new("pvc-1").with_size(5).with_protocol("NFS");
        let descriptor = provisioner.provision(&request).await.unwrap();

        assert_eq!(descriptor.name, "pvc-1");
        assert_eq!(descriptor.capacity_gb, 5);
        assert_eq!(
            descriptor.source,
            VolumeSource::Nfs(NfsVolumeSource {
                server: "10.0.0.5".into(),
                path: "/share1".into(),
                read_only: false,
            })
        );
        assert_eq!(descriptor.share_id(), Some("s1"));
        assert_eq!(descriptor.annotations[PROVISIONED_BY_ANNOTATION], "test-provisioner");

        let grants = api.grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].0, "s1");
        assert_eq!(grants[0].1.access_to, "vpc-default");
    }

    #[tokio::test]
    async fn test_selector_rejected_before_remote_calls() {
        let api = Arc::new(MockShareApi::new());
        let provisioner = provisioner(api.clone(), "");

        let mut request = VolumeRequest::new("pvc-1").with_size(5);
        request.selector = Some(LabelSelector::default());

        let err = provisioner.provision(&request).await.unwrap_err();
        assert!(matches!(err.kind(), ShareError::UnsupportedSelector));
        assert_eq!(err.stage, Stage::Validate);
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_remote_message() {
        let api = Arc::new(MockShareApi::new().failing_create("Share quota exceeded"));
        let provisioner = provisioner(api.clone(), "");

        let request = VolumeRequest::new("pvc-1").with_size(5);
        let err = provisioner.provision(&request).await.unwrap_err();

        assert_eq!(err.stage, Stage::CreateShare);
        assert!(err.to_string().starts_with("failed to create share:"));
        assert!(err.to_string().contains("Share quota exceeded"));
        assert_eq!(api.get_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_failure_leaves_share() {
        let api = Arc::new(MockShareApi::new().failing_grant("not permitted"));
        let provisioner = provisioner(api.clone(), "vpc-default");

        let request = VolumeRequest::new("pvc-1").with_size(5);
        let err = provisioner.provision(&request).await.unwrap_err();

        assert!(matches!(err.kind(), ShareError::RemoteAccessDenied(_)));
        assert!(api.share_exists("s1"));
        assert_eq!(api.delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_protocol_fails_after_grant() {
        let api = Arc::new(MockShareApi::new());
        let provisioner = provisioner(api.clone(), "vpc-default");

        let request = VolumeRequest::new("pvc-1").with_size(5).with_protocol("CIFS");
        let err = provisioner.provision(&request).await.unwrap_err();

        assert_eq!(err.stage, Stage::LookupBackend);
        assert!(matches!(err.kind(), ShareError::BackendNotFound(ref p) if p == "CIFS"));
        assert_eq!(api.grant_calls(), 1);
        assert!(api.share_exists("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_location() {
        let api = Arc::new(MockShareApi::new().with_export_location("no-colon"));
        let provisioner = provisioner(api.clone(), "");

        let request = VolumeRequest::new("pvc-1").with_size(1);
        let err = provisioner.provision(&request).await.unwrap_err();

        assert_eq!(err.stage, Stage::BuildSource);
        assert!(matches!(err.kind(), ShareError::MalformedLocation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_export_location_fails_after_grant() {
        let api = Arc::new(MockShareApi::new().without_export_location());
        let provisioner = provisioner(api.clone(), "vpc-default");

        let request = VolumeRequest::new("pvc-1").with_size(1);
        let err = provisioner.provision(&request).await.unwrap_err();

        assert_eq!(err.stage, Stage::ExportLocation);
        assert!(matches!(err.kind(), ShareError::NoExportLocation(ref id) if id == "s1"));
        assert_eq!(api.grant_calls(), 1);
        assert!(api.share_exists("s1"));
        assert_eq!(api.delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_share_timeout_still_provisions() {
        let api = Arc::new(MockShareApi::new().with_ready_after(2));
        let config = ProvisionerConfig {
            provisioner_name: "test-provisioner".to_string(),
            poll: PollSettings::new(Duration::from_secs(u64::MAX), Duration::from_secs(2)),
        };
        let provisioner = Provisioner::new(
            ShareClient::new(api.clone()),
            Arc::new(BackendRegistry::with_defaults()),
            config,
            "vpc-default",
        );

        let request = VolumeRequest::new("pvc-1").with_size(1);
        let descriptor = provisioner.provision(&request).await.unwrap();
        assert_eq!(descriptor.share_id(), Some("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait() {
        let api = Arc::new(MockShareApi::new().never_ready());
        let provisioner = provisioner(api.clone(), "");

        let token = CancellationToken::new();
        token.cancel();

        let request = VolumeRequest::new("pvc-1").with_size(1);
        let err = provisioner
            .provision_with_cancel(&request, &token)
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::WaitAvailable);
        assert!(matches!(err.kind(), ShareError::Cancelled(_)));
        assert_eq!(api.create_calls(), 1);
        assert_eq!(api.grant_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_propagates_remote_error() {
        let api = Arc::new(MockShareApi::new().failing_delete("share is busy"));
        let provisioner = provisioner(api.clone(), "");

        let mut annotations = BTreeMap::new();
        annotations.insert(SHARE_ID_ANNOTATION.to_string(), "s9".to_string());
        let descriptor = VolumeDescriptor {
            name: "pvc-9".into(),
            capacity_gb: 1,
            reclaim_policy: Default::default(),
            access_modes: vec![],
            source: VolumeSource::Nfs(NfsVolumeSource {
                server: "h".into(),
                path: "/p".into(),
                read_only: false,
            }),
            annotations,
        };

        let err = provisioner.delete(&descriptor).await.unwrap_err();
        assert!(matches!(err.kind(), ShareError::RemoteDeleteFailed(_)));
        assert!(err.to_string().starts_with("failed to delete share:"));
        assert_eq!(api.deleted(), vec!["s9".to_string()]);
    }
}
