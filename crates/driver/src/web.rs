//! Web platform driver.
//!
//! Talks to a running Chrome/Chromium instance over CDP. The websocket is
//! shared by every browser the driver creates; each browser gets its own
//! isolated browser context on top of it. Connecting is deferred until the
//! first browser is requested, so constructing (and even initializing) a
//! `WebDriver` never requires Chrome to be up.

use std::sync::Arc;

use async_trait::async_trait;
use browser::{Browser, CdpClient, Platform, WebBrowser};
use tokio::sync::RwLock;
use tracing::{info, warn};
use vision::DeviceViewport;

use crate::config::DriverConfig;
use crate::contract::{Driver, DriverState, StateCell};
use crate::error::{DriverError, Result};
use crate::registry::BrowserRegistry;

pub struct WebDriver {
    config: DriverConfig,
    client: RwLock<Option<Arc<CdpClient>>>,
    registry: BrowserRegistry,
    state: StateCell,
}

impl WebDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            registry: BrowserRegistry::new(),
            state: StateCell::new(),
        }
    }

    /// Connect on first use and reuse the client afterwards.
    async fn client(&self) -> Result<Arc<CdpClient>> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(Arc::clone(client));
        }

        let mut slot = self.client.write().await;
        // Another task may have connected while we waited for the lock.
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = CdpClient::connect(&self.config.cdp_url).await?;
        info!("[WebDriver] Connected to CDP endpoint {}", self.config.cdp_url);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl Driver for WebDriver {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    fn state(&self) -> DriverState {
        self.state.get()
    }

    async fn init(&self) -> Result<()> {
        match self.state.get() {
            DriverState::Ready => return Ok(()),
            DriverState::Destroyed => {
                return Err(DriverError::NotReady {
                    state: DriverState::Destroyed,
                })
            }
            _ => {}
        }

        // The websocket is opened lazily; init only marks the driver
        // usable so the lifecycle matches the mobile drivers.
        self.state.set(DriverState::Initializing);
        self.state.set(DriverState::Ready);
        info!(
            "[WebDriver] Ready (CDP endpoint {})",
            self.config.cdp_url
        );
        Ok(())
    }

    async fn create_browser(&self) -> Result<Arc<dyn Browser>> {
        self.state.require_ready()?;

        let client = self.client().await?;
        let working_dir = self.config.resolved_working_dir()?;
        let browser = WebBrowser::create(
            client,
            self.config.viewport,
            working_dir,
            self.config.normalize_screenshots,
        )
        .await?;

        self.registry.insert(browser.clone());
        info!(
            "[WebDriver] Browser session with ID {} created successfully.",
            browser.id()
        );
        Ok(browser)
    }

    async fn close_browser(&self, id: &str) -> Result<()> {
        self.state.require_ready()?;
        self.registry.close(id).await?;
        info!("[WebDriver] Browser session with ID {} closed.", id);
        Ok(())
    }

    fn device_info(&self) -> Result<DeviceViewport> {
        // Web drivers have no device attached.
        Err(DriverError::DeviceInfoUnavailable)
    }

    async fn destroy(&self) -> Result<()> {
        if self.state.get() == DriverState::Destroyed {
            return Err(DriverError::NotReady {
                state: DriverState::Destroyed,
            });
        }
        self.state.set(DriverState::Destroyed);

        for browser in self.registry.drain() {
            if let Err(error) = browser.destroy().await {
                warn!(
                    "[WebDriver] Failed to destroy browser {}: {}",
                    browser.id(),
                    error
                );
            }
        }

        if let Some(client) = self.client.write().await.take() {
            if let Err(error) = client.close().await {
                warn!("[WebDriver] Failed to close CDP connection: {}", error);
            }
        }

        info!("[WebDriver] Destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_reaches_ready_without_chrome() {
        let driver = WebDriver::new(DriverConfig::default());
        assert_eq!(driver.state(), DriverState::Uninitialized);

        driver.init().await.unwrap();
        assert_eq!(driver.state(), DriverState::Ready);

        // Idempotent while ready.
        driver.init().await.unwrap();
        assert_eq!(driver.state(), DriverState::Ready);
    }

    #[tokio::test]
    async fn test_create_browser_requires_init() {
        let driver = WebDriver::new(DriverConfig::default());
        let result = driver.create_browser().await;
        assert!(matches!(
            result,
            Err(DriverError::NotReady {
                state: DriverState::Uninitialized
            })
        ));
    }

    #[tokio::test]
    async fn test_close_unknown_browser_fails() {
        let driver = WebDriver::new(DriverConfig::default());
        driver.init().await.unwrap();

        let result = driver.close_browser("nonexistent").await;
        assert!(matches!(
            result,
            Err(DriverError::SessionNotFound { id }) if id == "nonexistent"
        ));
    }

    #[tokio::test]
    async fn test_device_info_is_unavailable_on_web() {
        let driver = WebDriver::new(DriverConfig::default());
        driver.init().await.unwrap();
        assert!(matches!(
            driver.device_info(),
            Err(DriverError::DeviceInfoUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_destroyed_driver_rejects_everything() {
        let driver = WebDriver::new(DriverConfig::default());
        driver.init().await.unwrap();
        driver.destroy().await.unwrap();
        assert_eq!(driver.state(), DriverState::Destroyed);

        assert!(driver.init().await.is_err());
        assert!(driver.create_browser().await.is_err());
        assert!(driver.destroy().await.is_err());
    }

    /// Requires Chrome with `--remote-debugging-port=9222`.
    #[tokio::test]
    #[ignore]
    async fn test_live_browser_roundtrip() {
        let driver = WebDriver::new(DriverConfig::default());
        driver.init().await.unwrap();

        let first = driver.create_browser().await.unwrap();
        let second = driver.create_browser().await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(driver.registry.len(), 2);

        driver.close_browser(first.id()).await.unwrap();
        assert_eq!(driver.registry.len(), 1);

        driver.destroy().await.unwrap();
        assert!(driver.registry.is_empty());
    }
}
