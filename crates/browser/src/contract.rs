//! The cross-platform browser action contract
//!
//! Every platform variant implements [`Browser`]; callers hold
//! `Arc<dyn Browser>` and never branch on the platform themselves. All
//! actions resolve to an [`ActionResult`] so downstream consumers see one
//! shape regardless of platform, including for actions a platform cannot
//! perform.

use crate::action::{
    ActionResult, NavigateOptions, Platform, DEFAULT_SLEEP_DURATION_MS, MAX_SLEEP_DURATION_MS,
};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait Browser: Send + Sync {
    /// Unique session identifier, stable for the browser's lifetime.
    fn id(&self) -> &str;

    fn platform(&self) -> Platform;

    /// Load `url` and wait for the page to be ready.
    async fn navigate(&self, url: &str, options: NavigateOptions) -> Result<ActionResult>;

    /// Click at device coordinates. With no coordinates the last
    /// remembered cursor position is used.
    async fn click(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult>;

    /// Move the pointer without clicking.
    async fn move_cursor(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult>;

    /// Press at the current position, move to the target, release.
    async fn drag(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult>;

    /// Press one key, or hold several together ("Control" + "a").
    async fn press_key(&self, keys: &[String]) -> Result<ActionResult>;

    /// Type text into the focused element.
    async fn type_text(&self, text: &str) -> Result<ActionResult>;

    /// Scroll one step in the named direction ("up", "down", "left",
    /// "right", any casing).
    async fn scroll(&self, direction: &str) -> Result<ActionResult>;

    /// Capture the viewport. The payload carries the (possibly
    /// normalized) image; the raw frame is persisted to disk.
    async fn screenshot(&self) -> Result<ActionResult>;

    /// Describe the innermost element at device coordinates.
    async fn locate_at(&self, x: f64, y: f64) -> Result<ActionResult>;

    /// Pause for `duration_ms`, bounded and defaulted.
    async fn sleep(&self, duration_ms: Option<u64>) -> Result<ActionResult>;

    /// Report window and cursor state.
    async fn get_state(&self) -> Result<ActionResult>;

    /// Reset session state (cookies, storage, extra pages) without
    /// tearing the browser down.
    async fn cleanup(&self) -> Result<ActionResult>;

    /// Tear the session down. The browser is unusable afterwards.
    async fn destroy(&self) -> Result<()>;
}

/// Shared sleep implementation: default when unset, clamp to the
/// maximum with a warning, report in rounded whole seconds.
pub(crate) async fn bounded_sleep(component: &str, duration_ms: Option<u64>) -> ActionResult {
    let requested = duration_ms.unwrap_or(DEFAULT_SLEEP_DURATION_MS);
    let duration = if requested > MAX_SLEEP_DURATION_MS {
        warn!(
            "[{}] Requested sleep duration {}ms exceeds maximum of {}ms. Using maximum.",
            component, requested, MAX_SLEEP_DURATION_MS
        );
        MAX_SLEEP_DURATION_MS
    } else {
        requested
    };

    let seconds = (duration as f64 / 1000.0).round() as u64;
    let label = if seconds == 1 { "second" } else { "seconds" };
    info!("[{}] Waiting for {} {}...", component, seconds, label);

    tokio::time::sleep(Duration::from_millis(duration)).await;
    ActionResult::message(format!("Slept for {seconds} {label}."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_defaults_to_one_second() {
        let started = Instant::now();
        let result = bounded_sleep("Test", None).await;
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
        assert_eq!(result.message, "Slept for 1 second.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_clamps_to_maximum() {
        let started = Instant::now();
        let result = bounded_sleep("Test", Some(120_000)).await;
        assert_eq!(started.elapsed(), Duration::from_millis(60_000));
        assert_eq!(result.message, "Slept for 60 seconds.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_reports_rounded_seconds() {
        let started = Instant::now();
        let result = bounded_sleep("Test", Some(2500)).await;
        // Sleeps the exact duration, reports the rounded figure.
        assert_eq!(started.elapsed(), Duration::from_millis(2500));
        assert_eq!(result.message, "Slept for 3 seconds.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_sleep_reports_zero_seconds() {
        let result = bounded_sleep("Test", Some(200)).await;
        assert_eq!(result.message, "Slept for 0 seconds.");
    }
}
