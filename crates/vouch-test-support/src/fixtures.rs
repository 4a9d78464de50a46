//! Polling helpers for asynchronous assertions.

use std::time::Duration;

/// Default budget for [`wait_until`] style checks.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// elapses. Returns the final evaluation.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return condition();
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// [`wait_until`] with [`SETTLE_TIMEOUT`].
pub async fn settle<F>(condition: F) -> bool
where
    F: FnMut() -> bool,
{
    wait_until(SETTLE_TIMEOUT, condition).await
}
