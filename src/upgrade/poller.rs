//! Bounded readiness polling.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{MupError, Result};

/// Interval and deadline of a readiness poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Poll `predicate` until it reports ready.
///
/// The predicate runs immediately and then once per `interval`. Errors from
/// the predicate count as "not ready yet" and are only logged. Fails with
/// [`MupError::Timeout`] once `timeout` has elapsed without a ready result, or
/// with [`MupError::Cancelled`] when `cancel` fires. A check that hangs is cut
/// off, so the call never outlives `timeout + interval`.
pub async fn wait_until_ready<F, Fut, E>(
    operation: &str,
    settings: PollSettings,
    cancel: &CancellationToken,
    mut predicate: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, E>>,
    E: Display,
{
    let start = Instant::now();
    let deadline = start + settings.timeout + settings.interval;
    let timed_out = || MupError::Timeout {
        operation: operation.to_string(),
        timeout: settings.timeout,
    };
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let checked = tokio::select! {
            () = cancel.cancelled() => return Err(MupError::Cancelled),
            checked = tokio::time::timeout_at(deadline, predicate()) => checked,
        };

        match checked {
            Ok(Ok(true)) => {
                debug!(attempt, "{} is ready", operation);
                return Ok(());
            }
            Ok(Ok(false)) => debug!(attempt, "{} not ready yet", operation),
            Ok(Err(e)) => debug!(attempt, error = %e, "{} check failed, retrying", operation),
            Err(_) => {
                debug!(attempt, "{} check did not complete before the deadline", operation);
                return Err(timed_out());
            }
        }

        if start.elapsed() >= settings.timeout {
            return Err(timed_out());
        }

        let wait = settings
            .interval
            .min(deadline.saturating_duration_since(Instant::now()));
        tokio::select! {
            () = cancel.cancelled() => return Err(MupError::Cancelled),
            () = tokio::time::sleep(wait) => {}
        }
    }
}
