//! # sfs-share
//!
//! Provisioning of network file shares on an SFS control plane.
//!
//! A volume request goes through a fixed sequence of remote calls, and the
//! result is a descriptor the orchestrator can mount and later hand back
//! for deletion:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Provisioner                  │
//! │   provision(VolumeRequest) / delete(desc)    │
//! └──────┬───────────────┬───────────────┬───────┘
//!        │               │               │
//!        ▼               ▼               ▼
//! ┌─────────────┐ ┌─────────────┐ ┌──────────────────┐
//! │ ShareClient │ │   poller    │ │ BackendRegistry  │
//! │ create/get/ │ │ wait until  │ │ protocol → build │
//! │ grant/delete│ │ available   │ │ volume source    │
//! └──────┬──────┘ └─────────────┘ └──────────────────┘
//!        ▼
//! ┌─────────────────────────────┐
//! │  ShareApi (HTTP or mock)    │
//! └─────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sfs_share::{BackendRegistry, MockShareApi, Provisioner, ProvisionerConfig, ShareClient, VolumeRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ShareClient::new(Arc::new(MockShareApi::new()));
//!     let provisioner = Provisioner::new(
//!         client,
//!         Arc::new(BackendRegistry::with_defaults()),
//!         ProvisionerConfig::default(),
//!         "vpc-123",
//!     );
//!
//!     let request = VolumeRequest::new("pvc-1").with_size(5);
//!     let volume = provisioner.provision(&request).await.unwrap();
//!     provisioner.delete(&volume).await.unwrap();
//! }
//! ```

pub mod api;
pub mod backends;
pub mod error;
pub mod mock;
pub mod poller;
pub mod provisioner;
pub mod share;
pub mod types;

pub use api::{HttpShareApi, HttpShareApiConfig, ShareApi};
pub use backends::{BackendRegistry, BuildSourceArgs, NfsBackend, ShareBackend, NFS_PROTOCOL};
pub use error::{ProvisionError, Result, ShareError, Stage};
pub use mock::MockShareApi;
pub use poller::{wait_for_status, PollSettings};
pub use provisioner::{
    validate_size, ProvisionState, Provisioner, ProvisionerConfig, DEFAULT_PROVISIONER_NAME,
};
pub use share::ShareClient;
pub use types::*;
