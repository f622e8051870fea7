use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Run `op` up to `max_attempts` times, sleeping `backoff` between attempts
/// and stopping on the first success. Returns the last error once the
/// attempt budget is exhausted.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, backoff: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    debug_assert!(max_attempts > 0);

    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                tracing::warn!("Attempt {}/{} failed: {}", attempt, max_attempts, e);
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!("Attempt {}/{} failed, giving up: {}", attempt, max_attempts, e);
                return Err(e);
            }
        }
    }
}
