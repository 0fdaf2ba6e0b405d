//! Bounded poll-with-deadline

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Repeatedly evaluate `probe` every `interval` until it reports `true` or
/// `timeout` elapses.
///
/// One last probe always runs after the deadline so that sleep overshoot
/// cannot turn a satisfied condition into a timeout. Errors from the probe
/// abort the wait immediately.
pub async fn poll_until<F, Fut, E>(interval: Duration, timeout: Duration, mut probe: F) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        if probe().await? {
            return Ok(true);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep(interval.min(remaining)).await;
    }

    probe().await
}
