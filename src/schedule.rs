//! Poll scheduling - interval policies and the cancellable poll loop
//!
//! Both synchronizers run on this loop. Cancelling stops the timer only: a tick
//! that is already fetching runs to completion, and the synchronizer discards
//! its result through its generation check.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What one poll tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Fetched and merged into the store
    Applied,
    /// Nothing to do (e.g. no session token)
    Skipped,
    /// Fetch failed; retried on the next tick
    Failed,
    /// Superseded by a newer generation; the loop exits
    Stale,
}

/// Delay before the next tick
pub trait PollPolicy: Send + Sync {
    fn delay(&self, consecutive_failures: u32) -> Duration;
}

/// Same delay regardless of failures
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval(pub Duration);

impl PollPolicy for FixedInterval {
    fn delay(&self, _consecutive_failures: u32) -> Duration {
        self.0
    }
}

/// Doubles the base interval per consecutive failure, capped at `max`
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl PollPolicy for ExponentialBackoff {
    fn delay(&self, consecutive_failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(consecutive_failures.min(16));
        self.base.saturating_mul(factor).min(self.max.max(self.base))
    }
}

/// Policy for an interval plus an optional backoff cap
pub fn policy_for(interval: Duration, max_backoff: Option<Duration>) -> Arc<dyn PollPolicy> {
    match max_backoff {
        Some(max) => Arc::new(ExponentialBackoff {
            base: interval,
            max,
        }),
        None => Arc::new(FixedInterval(interval)),
    }
}

/// Run `tick` after every policy delay until `cancel` fires or a tick reports `Stale`
pub fn spawn_poll_loop<F, Fut>(
    name: &'static str,
    policy: Arc<dyn PollPolicy>,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TickOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        let mut failures = 0u32;

        loop {
            let delay = policy.delay(failures);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(poller = name, "Poll loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match tick().await {
                TickOutcome::Applied | TickOutcome::Skipped => failures = 0,
                TickOutcome::Failed => failures = failures.saturating_add(1),
                TickOutcome::Stale => {
                    debug!(poller = name, "Poll loop superseded");
                    break;
                }
            }
        }
    })
}
