//! In-memory SFS API for testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::ShareApi;
use crate::error::{Result, ShareError};
use crate::types::{AccessGrant, CreateShareOpts, Share, ShareStatus};

/// Mock SFS control plane.
///
/// Shares are created in `creating` status and flip to `available` on the
/// N-th status fetch (see [`MockShareApi::with_ready_after`]). Every
/// operation is counted so tests can assert which remote calls happened.
/// Useful for:
/// - Unit and integration testing
/// - Running the daemon without a cloud account (`--dev`)
pub struct MockShareApi {
    shares: Mutex<HashMap<String, MockShare>>,
    grants: Mutex<Vec<(String, AccessGrant)>>,
    deleted: Mutex<Vec<String>>,
    next_id: AtomicUsize,

    export_location: String,
    omit_export_location: bool,
    ready_after: Option<usize>,
    create_failure: Option<String>,
    grant_failure: Option<String>,
    delete_failure: Option<String>,

    create_calls: AtomicUsize,
    get_calls: AtomicUsize,
    grant_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

struct MockShare {
    share: Share,
    fetches: usize,
}

impl MockShareApi {
    /// Shares become available on the first fetch and export
    /// `10.0.0.5:/share<N>`.
    pub fn new() -> Self {
        info!("Creating mock SFS API");
        Self {
            shares: Mutex::new(HashMap::new()),
            grants: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            export_location: String::new(),
            omit_export_location: false,
            ready_after: Some(1),
            create_failure: None,
            grant_failure: None,
            delete_failure: None,
            create_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            grant_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Export location reported once a share is available.
    pub fn with_export_location(mut self, location: impl Into<String>) -> Self {
        self.export_location = location.into();
        self
    }

    /// Available shares report no export location at all.
    pub fn without_export_location(mut self) -> Self {
        self.omit_export_location = true;
        self
    }

    /// Report `available` starting with the `polls`-th fetch of a share.
    pub fn with_ready_after(mut self, polls: usize) -> Self {
        self.ready_after = Some(polls);
        self
    }

    /// Shares stay in `creating` forever.
    pub fn never_ready(mut self) -> Self {
        self.ready_after = None;
        self
    }

    pub fn failing_create(mut self, message: impl Into<String>) -> Self {
        self.create_failure = Some(message.into());
        self
    }

    pub fn failing_grant(mut self, message: impl Into<String>) -> Self {
        self.grant_failure = Some(message.into());
        self
    }

    pub fn failing_delete(mut self, message: impl Into<String>) -> Self {
        self.delete_failure = Some(message.into());
        self
    }

    /// Insert an existing share, e.g. one that survived a previous run.
    pub fn insert_share(&self, share: Share) -> Result<()> {
        let mut shares = self.lock_shares()?;
        shares.insert(share.id.clone(), MockShare { share, fetches: 0 });
        Ok(())
    }

    pub fn share_exists(&self, share_id: &str) -> bool {
        self.shares
            .lock()
            .map(|shares| shares.contains_key(share_id))
            .unwrap_or(false)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn grant_calls(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Total remote calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.create_calls() + self.get_calls() + self.grant_calls() + self.delete_calls()
    }

    /// Grants issued so far, as `(share_id, grant)`.
    pub fn grants(&self) -> Vec<(String, AccessGrant)> {
        self.grants.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Share ids passed to delete so far, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn lock_shares(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MockShare>>> {
        self.shares
            .lock()
            .map_err(|_| ShareError::RemoteUnavailable("Lock poisoned".to_string()))
    }
}

impl Default for MockShareApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShareApi for MockShareApi {
    async fn create_share(&self, opts: &CreateShareOpts) -> Result<Share> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.create_failure {
            return Err(ShareError::RemoteCreateFailed(message.clone()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("s{}", n);
        let share = Share {
            id: id.clone(),
            name: opts.name.clone(),
            status: ShareStatus::Creating,
            share_proto: opts.share_proto.clone(),
            size: opts.size,
            availability_zone: opts.availability_zone.clone(),
            export_location: String::new(),
            export_locations: Vec::new(),
            metadata: opts.metadata.clone(),
            created_at: None,
        };

        self.lock_shares()?.insert(id.clone(), MockShare { share: share.clone(), fetches: 0 });
        debug!(share_id = %id, "Mock share created");
        Ok(share)
    }

    async fn get_share(&self, share_id: &str) -> Result<Share> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let mut shares = self.lock_shares()?;
        let entry = shares
            .get_mut(share_id)
            .ok_or_else(|| ShareError::RemoteNotFound(share_id.to_string()))?;

        entry.fetches += 1;
        let ready = self.ready_after.map_or(false, |n| entry.fetches >= n);
        if ready && entry.share.status == ShareStatus::Creating {
            entry.share.status = ShareStatus::Available;
            entry.share.export_location = if self.omit_export_location {
                String::new()
            } else if self.export_location.is_empty() {
                format!("10.0.0.5:/share{}", share_id.trim_start_matches('s'))
            } else {
                self.export_location.clone()
            };
        }

        Ok(entry.share.clone())
    }

    async fn grant_access(&self, share_id: &str, grant: &AccessGrant) -> Result<()> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.grant_failure {
            return Err(ShareError::RemoteAccessDenied(message.clone()));
        }
        if !self.share_exists(share_id) {
            return Err(ShareError::RemoteNotFound(share_id.to_string()));
        }

        self.grants
            .lock()
            .map_err(|_| ShareError::RemoteUnavailable("Lock poisoned".to_string()))?
            .push((share_id.to_string(), grant.clone()));
        Ok(())
    }

    async fn delete_share(&self, share_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.deleted
            .lock()
            .map_err(|_| ShareError::RemoteUnavailable("Lock poisoned".to_string()))?
            .push(share_id.to_string());

        if let Some(message) = &self.delete_failure {
            return Err(ShareError::RemoteDeleteFailed(message.clone()));
        }

        self.lock_shares()?
            .remove(share_id)
            .map(|_| ())
            .ok_or_else(|| ShareError::RemoteNotFound(share_id.to_string()))
    }
}
