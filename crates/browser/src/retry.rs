//! Bounded retry for flaky session calls
//!
//! Transport-level operations (session creation, in-page script installs)
//! fail transiently; wrapping them here keeps the call sites declarative.
//! The final error is returned unchanged so callers keep the real cause.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs `op` up to `attempts` times, returning the first success or the
/// last failure. `attempts` is clamped to at least one.
pub async fn retry<T, E, F, Fut>(attempts: usize, op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_delay(attempts, Duration::ZERO, op).await
}

/// Like [`retry`], pausing `delay` between consecutive attempts.
pub async fn retry_with_delay<T, E, F, Fut>(
    attempts: usize,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= attempts => return Err(error),
            Err(error) => {
                debug!(
                    "[Retry] Attempt {}/{} failed: {}. Retrying...",
                    attempt, attempts, error
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
