//! Waits for a newly created cluster to leave the provisioning state.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ClusterHandle, ClusterProvider, ClusterSnapshot, ClusterStatus, ProviderError};

/// Interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Controls how cluster status is polled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSettings {
    /// Delay before each status read.
    pub interval: Duration,
    /// Upper bound on total waiting; `None` waits until cancelled.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Polls `handle` until its status is no longer provisioning.
///
/// Each iteration sleeps for the interval and then reads the status once,
/// so a cluster that needs `N` provisioning reads returns after `N + 1`
/// reads. Any status other than provisioning ends the wait; only the error
/// state is a failure, so a cluster that goes straight on to `RECONCILING`
/// is returned as ready.
///
/// # Errors
///
/// Returns [`ProviderError::TerminalState`] for the error state,
/// [`ProviderError::Cancelled`] when `cancel` fires, and
/// [`ProviderError::ProvisionTimeout`] when the configured bound elapses.
/// Read failures are propagated as-is.
pub async fn wait_until_provisioned<P>(
    provider: &P,
    handle: &ClusterHandle,
    settings: &PollSettings,
    cancel: &CancellationToken,
) -> Result<ClusterSnapshot, ProviderError>
where
    P: ClusterProvider + ?Sized,
{
    let started = Instant::now();
    let cancelled = || ProviderError::Cancelled {
        cluster: handle.to_string(),
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            () = sleep(settings.interval) => {}
        }
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let snapshot = provider.get_cluster(handle).await?;
        match &snapshot.status {
            ClusterStatus::Provisioning => {
                debug!(cluster = %handle, "cluster is still provisioning");
                if let Some(bound) = settings.timeout
                    && started.elapsed() >= bound
                {
                    return Err(ProviderError::ProvisionTimeout {
                        cluster: handle.to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }
            ClusterStatus::Running => return Ok(snapshot),
            ClusterStatus::Error => {
                return Err(ProviderError::TerminalState {
                    cluster: handle.to_string(),
                    message: snapshot.status_message.clone(),
                    console_url: provider.console_url(handle),
                });
            }
            ClusterStatus::Other(status) => {
                warn!(cluster = %handle, status = %status, "cluster left provisioning in an unusual status");
                return Ok(snapshot);
            }
        }
    }
}
