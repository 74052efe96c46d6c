//! Bounded wait for a share to reach a status.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{Result, ShareError};
use crate::share::ShareClient;
use crate::types::ShareStatus;

/// Default overall wait, in seconds.
pub const DEFAULT_SHARE_TIMEOUT_SECS: u64 = 600;

/// Default pause between status fetches, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// How long and how often to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_SHARE_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl PollSettings {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Poll `share_id` until it reports `desired` or `settings.timeout` elapses.
///
/// Every fetch is preceded by a pause of `settings.interval` (shortened so
/// the last fetch lands on the deadline). A fetch error ends the wait
/// immediately with that error. Cancelling `cancel` ends it with
/// [`ShareError::Cancelled`]. A timeout too large to represent as an
/// instant means no deadline.
#[instrument(skip(client, settings, cancel), fields(share_id = %share_id, desired = %desired))]
pub async fn wait_for_status(
    client: &ShareClient,
    share_id: &str,
    desired: &ShareStatus,
    settings: &PollSettings,
    cancel: Option<&CancellationToken>,
) -> Result<()> {
    let started = Instant::now();
    let deadline = started.checked_add(settings.timeout);
    let mut last_status: Option<ShareStatus> = None;
    let mut polls: u32 = 0;

    loop {
        let now = Instant::now();
        let pause = match deadline {
            Some(deadline) if now >= deadline && polls > 0 => {
                return Err(ShareError::StatusTimeout {
                    share_id: share_id.to_string(),
                    desired: desired.clone(),
                    last_status,
                    timeout_secs: settings.timeout.as_secs(),
                });
            }
            Some(deadline) => settings.interval.min(deadline.saturating_duration_since(now)),
            None => settings.interval,
        };

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(ShareError::Cancelled(format!(
                            "stopped waiting for share {} to become {}",
                            share_id, desired
                        )));
                    }
                    _ = sleep(pause) => {}
                }
            }
            None => sleep(pause).await,
        }

        let share = client.get_share(share_id).await?;
        polls += 1;

        if &share.status == desired {
            info!(
                polls,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Share reached desired status"
            );
            return Ok(());
        }

        debug!(polls, status = %share.status, "Share not ready yet");
        last_status = Some(share.status);
    }
}
