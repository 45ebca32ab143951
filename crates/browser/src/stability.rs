//! UI stability detection
//!
//! Actions that read the page (state capture, element lookup) first wait
//! for it to settle. Settling has two phases:
//!
//! 1. Load: race DOMContentLoaded against a direct body-presence probe,
//!    bounded by a short timeout. Losing the race is an error.
//! 2. Quiet: resolve once no DOM mutation has been observed for a full
//!    quiet window. Every mutation restarts the window. A hard ceiling
//!    bounds pathological pages that mutate forever (animations,
//!    tickers); hitting it logs and proceeds instead of failing.

use crate::cdp::CdpPage;
use crate::error::{BrowserError, Result};
use crate::events::PageEvent;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

const BODY_PROBE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct StabilityConfig {
    /// Bound on the load phase. Exceeding it fails the wait.
    pub load_timeout: Duration,
    /// Mutation-free span required before the page counts as quiet.
    pub quiet_window: Duration,
    /// Upper bound on the quiet phase as a whole. Reaching it resolves
    /// with a warning rather than an error.
    pub quiescence_ceiling: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_millis(1000),
            quiet_window: Duration::from_millis(1000),
            quiescence_ceiling: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StabilityDetector {
    config: StabilityConfig,
}

impl StabilityDetector {
    pub fn new(config: StabilityConfig) -> Self {
        Self { config }
    }

    /// Phase one: wait until the document is usable.
    ///
    /// The event race alone is not enough: on an already-loaded page the
    /// DOMContentLoaded event fired long ago, so a direct probe for
    /// `document.body` runs alongside it.
    pub async fn wait_for_load(&self, page: &CdpPage) -> Result<()> {
        let events = page.subscribe();
        let probe = async {
            loop {
                match page.evaluate("document.body !== null").await {
                    Ok(Value::Bool(true)) => return,
                    _ => tokio::time::sleep(BODY_PROBE_INTERVAL).await,
                }
            }
        };
        await_load_signal(events, probe, self.config.load_timeout).await
    }

    /// Phase two: wait for a full mutation-free window.
    pub async fn wait_for_quiet(&self, mut events: broadcast::Receiver<PageEvent>) {
        let ceiling = tokio::time::sleep(self.config.quiescence_ceiling);
        tokio::pin!(ceiling);
        let mut events_done = false;

        loop {
            // Fresh quiet window after every observed mutation.
            let quiet = tokio::time::sleep(self.config.quiet_window);
            tokio::pin!(quiet);

            loop {
                tokio::select! {
                    _ = &mut ceiling => {
                        warn!(
                            "[StabilityDetector] DOM still mutating after {}ms. Proceeding anyway.",
                            self.config.quiescence_ceiling.as_millis()
                        );
                        return;
                    }
                    _ = &mut quiet => return,
                    event = events.recv(), if !events_done => {
                        match event {
                            Ok(PageEvent::MutationObserved) => break,
                            Ok(_) => continue,
                            // Missed events count as mutations.
                            Err(broadcast::error::RecvError::Lagged(_)) => break,
                            Err(broadcast::error::RecvError::Closed) => {
                                events_done = true;
                                continue;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Both phases in order: load, then quiet.
    pub async fn wait_for_stable(&self, page: &CdpPage) -> Result<()> {
        self.wait_for_load(page).await?;
        // Subscribing after the load phase means mutations that happened
        // during loading do not stretch the quiet wait.
        self.wait_for_quiet(page.subscribe()).await;
        Ok(())
    }
}

/// Core of the load phase, factored out so it can be driven by a synthetic
/// probe in tests.
async fn await_load_signal(
    mut events: broadcast::Receiver<PageEvent>,
    probe: impl Future<Output = ()>,
    timeout: Duration,
) -> Result<()> {
    let loaded_event = async {
        loop {
            match events.recv().await {
                Ok(PageEvent::ContentLoaded) | Ok(PageEvent::LoadFired) => return,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                // Bus gone: leave it to the probe or the timeout.
                Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    };

    tokio::select! {
        _ = loaded_event => Ok(()),
        _ = probe => Ok(()),
        _ = tokio::time::sleep(timeout) => Err(BrowserError::StabilityTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PageEventBus;
    use std::future::pending;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_load_resolves_on_content_loaded() {
        let bus = Arc::new(PageEventBus::new());
        let events = bus.subscribe();
        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            publisher.publish(PageEvent::ContentLoaded);
        });

        let started = Instant::now();
        let result = await_load_signal(events, pending(), Duration::from_millis(1000)).await;

        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_resolves_via_probe_on_already_loaded_page() {
        let bus = PageEventBus::new();
        let probe = tokio::time::sleep(Duration::from_millis(200));

        let started = Instant::now();
        let result = await_load_signal(bus.subscribe(), probe, Duration::from_millis(1000)).await;

        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_times_out_with_descriptive_error() {
        let bus = PageEventBus::new();

        let started = Instant::now();
        let result = await_load_signal(bus.subscribe(), pending(), Duration::from_millis(1000)).await;

        assert_eq!(started.elapsed(), Duration::from_millis(1000));
        let error = result.unwrap_err();
        assert!(matches!(
            error,
            BrowserError::StabilityTimeout { timeout_ms: 1000 }
        ));
        assert_eq!(
            error.to_string(),
            "Timed out after 1000ms waiting for the DOM to stabilize"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_survives_closed_bus() {
        let bus = PageEventBus::new();
        let events = bus.subscribe();
        drop(bus);

        let probe = tokio::time::sleep(Duration::from_millis(100));
        let result = await_load_signal(events, probe, Duration::from_millis(1000)).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_resolves_after_one_silent_window() {
        let detector = StabilityDetector::default();
        let bus = PageEventBus::new();

        let started = Instant::now();
        detector.wait_for_quiet(bus.subscribe()).await;
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_mutation_restarts_the_quiet_window() {
        let detector = StabilityDetector::default();
        let bus = Arc::new(PageEventBus::new());
        let events = bus.subscribe();

        let publisher = bus.clone();
        tokio::spawn(async move {
            publisher.publish(PageEvent::MutationObserved);
            tokio::time::sleep(Duration::from_millis(400)).await;
            publisher.publish(PageEvent::MutationObserved);
            tokio::time::sleep(Duration::from_millis(400)).await;
            publisher.publish(PageEvent::MutationObserved);
        });

        let started = Instant::now();
        detector.wait_for_quiet(events).await;
        // Last mutation at 800ms, then one full quiet window.
        assert_eq!(started.elapsed(), Duration::from_millis(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_bounds_endlessly_mutating_pages() {
        let detector = StabilityDetector::new(StabilityConfig {
            load_timeout: Duration::from_millis(1000),
            quiet_window: Duration::from_millis(1000),
            quiescence_ceiling: Duration::from_millis(2500),
        });
        let bus = Arc::new(PageEventBus::new());
        let events = bus.subscribe();

        let publisher = bus.clone();
        let handle = tokio::spawn(async move {
            loop {
                publisher.publish(PageEvent::MutationObserved);
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
        });

        let started = Instant::now();
        detector.wait_for_quiet(events).await;
        assert_eq!(started.elapsed(), Duration::from_millis(2500));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_treats_closed_bus_as_silence() {
        let detector = StabilityDetector::default();
        let bus = PageEventBus::new();
        let events = bus.subscribe();
        drop(bus);

        let started = Instant::now();
        detector.wait_for_quiet(events).await;
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_mutation_events_do_not_restart_the_window() {
        let detector = StabilityDetector::default();
        let bus = Arc::new(PageEventBus::new());
        let events = bus.subscribe();

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            publisher.publish(PageEvent::LoadFired);
        });

        let started = Instant::now();
        detector.wait_for_quiet(events).await;
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }
}
