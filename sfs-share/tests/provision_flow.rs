//! End-to-end provisioning scenarios against the mock SFS API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sfs_share::{
    BackendRegistry, MockShareApi, NfsVolumeSource, PollSettings, Provisioner, ProvisionerConfig,
    ReclaimPolicy, ShareClient, ShareError, ShareStatus, Stage, VolumeDescriptor, VolumeRequest,
    VolumeSource, SHARE_ID_ANNOTATION,
};

fn provisioner(api: Arc<MockShareApi>, timeout_secs: u64) -> Provisioner {
    let config = ProvisionerConfig {
        provisioner_name: "external.k8s.io/sfs".to_string(),
        poll: PollSettings::new(Duration::from_secs(timeout_secs), Duration::from_secs(2)),
    };
    Provisioner::new(
        ShareClient::new(api),
        Arc::new(BackendRegistry::with_defaults()),
        config,
        "vpc-fallback",
    )
}

fn descriptor_with(annotations: BTreeMap<String, String>) -> VolumeDescriptor {
    VolumeDescriptor {
        name: "pvc-1".to_string(),
        capacity_gb: 5,
        reclaim_policy: ReclaimPolicy::Delete,
        access_modes: vec![],
        source: VolumeSource::Nfs(NfsVolumeSource {
            server: "10.0.0.5".to_string(),
            path: "/share1".to_string(),
            read_only: false,
        }),
        annotations,
    }
}

/// Share becomes available after a few polls and the descriptor points at it.
#[tokio::test(start_paused = true)]
async fn test_provision_nfs_share() {
    let api = Arc::new(
        MockShareApi::new()
            .with_ready_after(4)
            .with_export_location("10.0.0.5:/share1"),
    );
    let provisioner = provisioner(api.clone(), 60);

    let request = VolumeRequest::new("pvc-1").with_size(5).with_protocol("NFS");
    let descriptor = provisioner.provision(&request).await.unwrap();

    match &descriptor.source {
        VolumeSource::Nfs(nfs) => {
            assert_eq!(nfs.server, "10.0.0.5");
            assert_eq!(nfs.path, "/share1");
            assert!(!nfs.read_only);
        }
    }
    assert_eq!(descriptor.annotations[SHARE_ID_ANNOTATION], "s1");
    assert_eq!(api.create_calls(), 1);
    assert_eq!(api.grant_calls(), 1);
    assert_eq!(api.delete_calls(), 0);
}

/// Share never becomes available: timeout, no grant, no cleanup.
#[tokio::test(start_paused = true)]
async fn test_provision_times_out() {
    let api = Arc::new(MockShareApi::new().never_ready());
    let provisioner = provisioner(api.clone(), 20);

    let request = VolumeRequest::new("pvc-1").with_size(5).with_protocol("NFS");
    let err = provisioner.provision(&request).await.unwrap_err();

    assert_eq!(err.stage, Stage::WaitAvailable);
    match err.kind() {
        ShareError::StatusTimeout { share_id, last_status, .. } => {
            assert_eq!(share_id, "s1");
            assert_eq!(last_status, &Some(ShareStatus::Creating));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(api.grant_calls(), 0);
    assert_eq!(api.delete_calls(), 0);
    assert!(api.share_exists("s1"));
}

/// Invalid sizes are rejected before any remote call.
#[tokio::test]
async fn test_invalid_size_makes_no_remote_calls() {
    let api = Arc::new(MockShareApi::new());
    let provisioner = provisioner(api.clone(), 60);

    for size in [Some(0), Some(-1), Some(i64::MIN), None] {
        let mut request = VolumeRequest::new("pvc-1");
        request.size_gb = size;

        let err = provisioner.provision(&request).await.unwrap_err();
        assert!(
            matches!(err.kind(), ShareError::InvalidSize(_)),
            "size {:?} gave {:?}",
            size,
            err
        );
    }
    assert_eq!(api.total_calls(), 0);
}

/// Deleting a provisioned volume removes exactly its share.
#[tokio::test]
async fn test_delete_issues_single_call() {
    let api = Arc::new(MockShareApi::new());
    let provisioner = provisioner(api.clone(), 60);
    api.insert_share(
        serde_json::from_str(r#"{"id": "s1", "status": "available", "share_proto": "NFS"}"#)
            .unwrap(),
    )
    .unwrap();

    let mut annotations = BTreeMap::new();
    annotations.insert(SHARE_ID_ANNOTATION.to_string(), "s1".to_string());
    provisioner.delete(&descriptor_with(annotations)).await.unwrap();

    assert_eq!(api.delete_calls(), 1);
    assert_eq!(api.deleted(), vec!["s1".to_string()]);
    assert!(!api.share_exists("s1"));
}

/// Without a share id annotation nothing is deleted.
#[tokio::test]
async fn test_delete_without_share_id() {
    let api = Arc::new(MockShareApi::new());
    let provisioner = provisioner(api.clone(), 60);

    let err = provisioner
        .delete(&descriptor_with(BTreeMap::new()))
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ShareError::MissingShareID));

    let mut blank = BTreeMap::new();
    blank.insert(SHARE_ID_ANNOTATION.to_string(), String::new());
    let err = provisioner.delete(&descriptor_with(blank)).await.unwrap_err();
    assert!(matches!(err.kind(), ShareError::MissingShareID));

    assert_eq!(api.delete_calls(), 0);
}

/// Provision then delete round trip, with the request's own network id.
#[tokio::test(start_paused = true)]
async fn test_provision_then_delete() {
    let api = Arc::new(MockShareApi::new().with_ready_after(2));
    let provisioner = provisioner(api.clone(), 60);

    let request = VolumeRequest::new("pv-data")
        .with_claim("7f3c", "team-a", "data")
        .with_size(10)
        .with_vpc_id("vpc-team-a");
    let descriptor = provisioner.provision(&request).await.unwrap();

    let grants = api.grants();
    assert_eq!(grants[0].1.access_to, "vpc-team-a");

    provisioner.delete(&descriptor).await.unwrap();
    assert_eq!(api.deleted(), vec!["s1".to_string()]);
}

/// Repeated provisioning of the same claim creates distinct shares.
#[tokio::test(start_paused = true)]
async fn test_provision_is_not_idempotent() {
    let api = Arc::new(MockShareApi::new());
    let provisioner = provisioner(api.clone(), 60);

    let request = VolumeRequest::new("pv-data").with_claim("7f3c", "ns", "data").with_size(1);
    let first = provisioner.provision(&request).await.unwrap();
    let second = provisioner.provision(&request).await.unwrap();

    assert_eq!(first.share_id(), Some("s1"));
    assert_eq!(second.share_id(), Some("s2"));
    assert_eq!(api.create_calls(), 2);
}
