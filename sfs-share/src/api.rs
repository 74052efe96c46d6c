//! Remote SFS control-plane API.
//!
//! [`ShareApi`] is the authenticated handle the rest of the crate talks
//! through. [`HttpShareApi`] speaks the shared-file-system v2 REST dialect:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create    | `POST   {endpoint}/shares` |
//! | get       | `GET    {endpoint}/shares/{id}` |
//! | grant     | `POST   {endpoint}/shares/{id}/action` (`os-allow_access`) |
//! | delete    | `DELETE {endpoint}/shares/{id}` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Result, ShareError};
use crate::types::{AccessGrant, CreateShareOpts, Share};

/// Typed operations against the storage control plane.
///
/// Implementations must be safe to share between concurrent provisioning
/// attempts.
#[async_trait]
pub trait ShareApi: Send + Sync {
    /// Submit a share-creation request.
    async fn create_share(&self, opts: &CreateShareOpts) -> Result<Share>;

    /// Fetch the current state of a share.
    async fn get_share(&self, share_id: &str) -> Result<Share>;

    /// Add an access rule to a share.
    async fn grant_access(&self, share_id: &str, grant: &AccessGrant) -> Result<()>;

    /// Delete a share. Deleting an unknown id is an error.
    async fn delete_share(&self, share_id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct CreateShareBody<'a> {
    share: &'a CreateShareOpts,
}

#[derive(Deserialize)]
struct ShareEnvelope {
    share: Share,
}

#[derive(Serialize)]
struct GrantAccessBody<'a> {
    #[serde(rename = "os-allow_access")]
    allow_access: &'a AccessGrant,
}

/// Connection settings for [`HttpShareApi`].
#[derive(Debug, Clone)]
pub struct HttpShareApiConfig {
    /// Service endpoint including version and project, e.g.
    /// `https://sfs.example.com/v2/<project>`
    pub endpoint: String,
    /// Token sent as `X-Auth-Token`
    pub auth_token: String,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// [`ShareApi`] over HTTP.
pub struct HttpShareApi {
    endpoint: String,
    auth_token: String,
    http_client: reqwest::Client,
}

impl HttpShareApi {
    pub fn new(config: HttpShareApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| ShareError::RemoteUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(config.endpoint, config.auth_token, http_client))
    }

    /// Use an existing reqwest client (shared connection pool).
    pub fn with_client(
        endpoint: impl Into<String>,
        auth_token: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            auth_token: auth_token.into(),
            http_client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        debug!(method = %method, url = %url, "SFS request");

        self.http_client
            .request(method, url)
            .header("X-Auth-Token", &self.auth_token)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            warn!(error = %e, "Failed to reach SFS control plane");
            ShareError::RemoteUnavailable(e.to_string())
        })
    }
}

#[async_trait]
impl ShareApi for HttpShareApi {
    #[instrument(skip(self, opts), fields(name = %opts.name, proto = %opts.share_proto, size = opts.size))]
    async fn create_share(&self, opts: &CreateShareOpts) -> Result<Share> {
        let request = self
            .request(Method::POST, "/shares")
            .json(&CreateShareBody { share: opts });
        let response = self.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            let message = fault_message(status, &response.text().await.unwrap_or_default());
            return Err(ShareError::RemoteCreateFailed(message));
        }

        let envelope: ShareEnvelope = response.json().await.map_err(|e| {
            ShareError::RemoteCreateFailed(format!("unexpected create response: {}", e))
        })?;
        Ok(envelope.share)
    }

    #[instrument(skip(self), fields(share_id = %share_id))]
    async fn get_share(&self, share_id: &str) -> Result<Share> {
        let request = self.request(Method::GET, &format!("/shares/{}", share_id));
        let response = self.send(request).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ShareError::RemoteNotFound(share_id.to_string()));
        }
        if !status.is_success() {
            let message = fault_message(status, &response.text().await.unwrap_or_default());
            return Err(ShareError::RemoteUnavailable(message));
        }

        let envelope: ShareEnvelope = response.json().await.map_err(|e| {
            ShareError::RemoteUnavailable(format!("unexpected share response: {}", e))
        })?;
        Ok(envelope.share)
    }

    #[instrument(skip(self, grant), fields(share_id = %share_id, access_to = %grant.access_to))]
    async fn grant_access(&self, share_id: &str, grant: &AccessGrant) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("/shares/{}/action", share_id))
            .json(&GrantAccessBody { allow_access: grant });
        let response = self.send(request).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ShareError::RemoteNotFound(share_id.to_string()));
        }
        if !status.is_success() {
            let message = fault_message(status, &response.text().await.unwrap_or_default());
            return Err(ShareError::RemoteAccessDenied(message));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(share_id = %share_id))]
    async fn delete_share(&self, share_id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("/shares/{}", share_id));
        let response = self.send(request).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ShareError::RemoteNotFound(share_id.to_string()));
        }
        if !status.is_success() {
            let message = fault_message(status, &response.text().await.unwrap_or_default());
            return Err(ShareError::RemoteDeleteFailed(message));
        }
        Ok(())
    }
}

/// Extract the human-readable message from an API fault body.
///
/// Faults look like `{"badRequest": {"message": "...", "code": 400}}`.
/// Bodies that don't match are returned as-is, prefixed with the status.
fn fault_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        json.as_object()?
            .values()
            .find_map(|fault| fault.get("message")?.as_str())
            .map(str::to_string)
    });

    match message {
        Some(message) => message,
        None if body.trim().is_empty() => format!("HTTP {}", status),
        None => format!("HTTP {}: {}", status, body.trim()),
    }
}
