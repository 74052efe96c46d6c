//! Type definitions for volume requests, remote shares and volume descriptors.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Protocol used when the request does not name one.
pub const DEFAULT_PROTOCOL: &str = "NFS";

/// Descriptor annotation holding the remote share id.
pub const SHARE_ID_ANNOTATION: &str = "shareID";

/// Descriptor annotation naming the provisioner that created the volume.
pub const PROVISIONED_BY_ANNOTATION: &str = "pv.kubernetes.io/provisioned-by";

/// Share metadata tags identifying the originating claim.
pub const CREATED_FOR_CLAIM_NAMESPACE_TAG: &str = "kubernetes.io/created-for/pvc/namespace";
pub const CREATED_FOR_CLAIM_NAME_TAG: &str = "kubernetes.io/created-for/pvc/name";
pub const CREATED_FOR_VOLUME_NAME_TAG: &str = "kubernetes.io/created-for/pv/name";

// =============================================================================
// REMOTE SHARE
// =============================================================================

/// Lifecycle status of a remote share.
///
/// Values outside the known vocabulary are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShareStatus {
    Creating,
    Available,
    Error,
    Deleting,
    Deleted,
    ErrorDeleting,
    Other(String),
}

impl ShareStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::Error => "error",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::ErrorDeleting => "error_deleting",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ShareStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "creating" => Self::Creating,
            "available" => Self::Available,
            "error" => Self::Error,
            "deleting" => Self::Deleting,
            "deleted" => Self::Deleted,
            "error_deleting" => Self::ErrorDeleting,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for ShareStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ShareStatus> for String {
    fn from(status: ShareStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ShareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A share as reported by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    /// Remote identifier assigned by the control plane
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub status: ShareStatus,
    /// Wire protocol, e.g. "NFS"
    #[serde(default, deserialize_with = "null_as_default")]
    pub share_proto: String,
    /// Size in GB
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub export_location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub export_locations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Share {
    /// Address used to mount the share.
    ///
    /// The singular field wins; otherwise the first listed location is
    /// used. `None` when neither yields a non-empty string.
    pub fn mount_location(&self) -> Option<&str> {
        let location = if self.export_location.is_empty() {
            self.export_locations.first().map(String::as_str).unwrap_or("")
        } else {
            self.export_location.as_str()
        };

        if location.is_empty() {
            None
        } else {
            Some(location)
        }
    }
}

/// Parameters sent to the control plane when creating a share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShareOpts {
    pub name: String,
    pub share_proto: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Access level of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "ro")]
    ReadOnly,
}

/// How the grant target is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessType {
    #[serde(rename = "cert")]
    Cert,
    #[serde(rename = "ip")]
    Ip,
}

/// Access rule submitted for a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_level: AccessLevel,
    pub access_type: AccessType,
    /// Network id (or allow-list entry) being granted access
    pub access_to: String,
}

impl AccessGrant {
    /// Read-write, certificate based access for the given network.
    pub fn read_write(target: impl Into<String>) -> Self {
        Self {
            access_level: AccessLevel::ReadWrite,
            access_type: AccessType::Cert,
            access_to: target.into(),
        }
    }
}

// =============================================================================
// VOLUME REQUEST
// =============================================================================

/// Identity of the storage claim a volume is provisioned for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimRef {
    pub uid: String,
    pub namespace: String,
    pub name: String,
}

/// Label selector over existing volumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

/// Storage class parameters that shape the remote share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareParameters {
    /// Share protocol, defaults to NFS
    pub protocol: Option<String>,
    /// Availability zone
    #[serde(rename = "availability")]
    pub availability_zone: Option<String>,
    /// Share type
    #[serde(rename = "type")]
    pub share_type: Option<String>,
    /// Network id that is granted access to the share
    #[serde(rename = "vpcid")]
    pub vpc_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimPolicy {
    #[default]
    Delete,
    Retain,
}

/// A request for a new volume backed by a share.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    /// Volume name chosen by the orchestrator
    pub name: String,
    /// Claim the volume is provisioned for
    #[serde(default)]
    pub claim: ClaimRef,
    /// Requested size in GB
    #[serde(default)]
    pub size_gb: Option<i64>,
    #[serde(default)]
    pub parameters: ShareParameters,
    /// Labels propagated to the share metadata
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub selector: Option<LabelSelector>,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
}

impl VolumeRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            claim: ClaimRef::default(),
            size_gb: None,
            parameters: ShareParameters::default(),
            labels: BTreeMap::new(),
            selector: None,
            access_modes: vec![AccessMode::ReadWriteMany],
            reclaim_policy: ReclaimPolicy::Delete,
        }
    }

    pub fn with_size(mut self, size_gb: i64) -> Self {
        self.size_gb = Some(size_gb);
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.parameters.protocol = Some(protocol.into());
        self
    }

    pub fn with_claim(
        mut self,
        uid: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.claim = ClaimRef {
            uid: uid.into(),
            namespace: namespace.into(),
            name: name.into(),
        };
        self
    }

    pub fn with_vpc_id(mut self, vpc_id: impl Into<String>) -> Self {
        self.parameters.vpc_id = Some(vpc_id.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Name of the remote share: `pvc-<claim uid>`, or the volume name
    /// when the claim has no uid.
    pub fn share_name(&self) -> String {
        if self.claim.uid.trim().is_empty() {
            self.name.clone()
        } else {
            format!("pvc-{}", self.claim.uid)
        }
    }

    /// Requested protocol with the default applied to blank values.
    pub fn protocol(&self) -> &str {
        non_blank(&self.parameters.protocol).unwrap_or(DEFAULT_PROTOCOL)
    }

    pub fn availability_zone(&self) -> Option<&str> {
        non_blank(&self.parameters.availability_zone)
    }

    pub fn share_type(&self) -> Option<&str> {
        non_blank(&self.parameters.share_type)
    }

    pub fn vpc_id(&self) -> Option<&str> {
        non_blank(&self.parameters.vpc_id)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// VOLUME DESCRIPTOR
// =============================================================================

/// NFS mount source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsVolumeSource {
    pub server: String,
    pub path: String,
    pub read_only: bool,
}

/// Protocol-specific locator used to mount a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeSource {
    Nfs(NfsVolumeSource),
}

/// A provisioned volume as handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDescriptor {
    pub name: String,
    pub capacity_gb: u64,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    pub source: VolumeSource,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl VolumeDescriptor {
    /// Remote share id recorded at provision time, if any.
    pub fn share_id(&self) -> Option<&str> {
        self.annotations
            .get(SHARE_ID_ANNOTATION)
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
