//! Share operations on behalf of a volume request.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::ShareApi;
use crate::error::Result;
use crate::types::{
    AccessGrant, CreateShareOpts, Share, VolumeRequest, CREATED_FOR_CLAIM_NAMESPACE_TAG,
    CREATED_FOR_CLAIM_NAME_TAG, CREATED_FOR_VOLUME_NAME_TAG,
};

/// Stateless client turning volume requests into remote share calls.
#[derive(Clone)]
pub struct ShareClient {
    api: Arc<dyn ShareApi>,
}

impl ShareClient {
    pub fn new(api: Arc<dyn ShareApi>) -> Self {
        Self { api }
    }

    /// Build the create parameters for a request of `size_gb` gigabytes.
    pub fn create_opts(request: &VolumeRequest, size_gb: u64) -> CreateShareOpts {
        let name = request.share_name();

        let mut metadata: HashMap<String, String> = request
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        metadata.insert(
            CREATED_FOR_CLAIM_NAMESPACE_TAG.to_string(),
            request.claim.namespace.clone(),
        );
        metadata.insert(CREATED_FOR_CLAIM_NAME_TAG.to_string(), request.claim.name.clone());
        metadata.insert(CREATED_FOR_VOLUME_NAME_TAG.to_string(), name.clone());

        CreateShareOpts {
            name,
            share_proto: request.protocol().to_string(),
            size: size_gb,
            availability_zone: request.availability_zone().map(str::to_string),
            share_type: request.share_type().map(str::to_string),
            metadata,
        }
    }

    /// Create the share backing `request`.
    #[instrument(skip(self, request), fields(volume = %request.name))]
    pub async fn create_share(&self, request: &VolumeRequest, size_gb: u64) -> Result<Share> {
        let opts = Self::create_opts(request, size_gb);
        info!(
            name = %opts.name,
            proto = %opts.share_proto,
            size_gb = opts.size,
            availability_zone = ?opts.availability_zone,
            share_type = ?opts.share_type,
            "Creating share"
        );

        let share = self.api.create_share(&opts).await?;
        info!(share_id = %share.id, status = %share.status, "Share create accepted");
        Ok(share)
    }

    pub async fn get_share(&self, share_id: &str) -> Result<Share> {
        self.api.get_share(share_id).await
    }

    /// Grant read-write access on the share to `target`.
    #[instrument(skip(self), fields(share_id = %share_id))]
    pub async fn grant_access(&self, share_id: &str, target: &str) -> Result<()> {
        let grant = AccessGrant::read_write(target);
        self.api.grant_access(share_id, &grant).await?;
        info!(access_to = %target, "Access granted");
        Ok(())
    }

    #[instrument(skip(self), fields(share_id = %share_id))]
    pub async fn delete_share(&self, share_id: &str) -> Result<()> {
        self.api.delete_share(share_id).await?;
        info!("Share deleted");
        Ok(())
    }
}

/// Network that should be granted access: the request's own network id
/// when set, otherwise the process-wide fallback.
pub fn access_target<'a>(request: &'a VolumeRequest, fallback: &'a str) -> &'a str {
    request.vpc_id().unwrap_or(fallback)
}
