// Bounded retry for connection establishment.
//
// Only failures the producing layer tagged as timeouts are retried.
// Authentication, protocol and configuration failures surface on the
// first attempt. There is no delay between attempts: each attempt is
// already bounded by its own timeout.

use std::future::Future;

use tracing::debug;

/// Classification hook for errors fed through [`retry`].
pub trait Retryable {
    /// Whether this failure is transient because it timed out.
    fn is_timeout(&self) -> bool;
}

/// Run `op` up to `max_attempts` times.
///
/// Returns the first success, the first non-timeout failure, or the last
/// timeout failure once the attempts are exhausted. A `max_attempts` of
/// zero still runs the operation once.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_timeout() && attempt < max_attempts => {
                debug!(attempt, max_attempts, error = %err, "attempt timed out, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
