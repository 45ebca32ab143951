//! iOS platform driver.
//!
//! The XCUITest counterpart of [`crate::android::AndroidDriver`]: one
//! Appium-backed device session established during `init`, shared by every
//! browser created afterwards.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use browser::screenshots::ensure_screenshots_dir;
use browser::{retry, Browser, IosBrowser, MobileSession, Platform};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;
use vision::DeviceViewport;

use crate::android::CONNECT_ATTEMPTS;
use crate::config::DriverConfig;
use crate::contract::{Driver, DriverState, StateCell};
use crate::error::{DriverError, Result};
use crate::registry::BrowserRegistry;

pub struct IosDriver {
    config: DriverConfig,
    session: Arc<MobileSession>,
    registry: BrowserRegistry,
    state: StateCell,
    viewport: RwLock<Option<DeviceViewport>>,
}

impl IosDriver {
    pub fn new(config: DriverConfig) -> Result<Self> {
        let server_url = Url::parse(&config.automation_server_url)?;
        Ok(Self {
            config,
            session: Arc::new(MobileSession::new(server_url)),
            registry: BrowserRegistry::new(),
            state: StateCell::new(),
            viewport: RwLock::new(None),
        })
    }

    fn capabilities(&self) -> Value {
        let mut capabilities = json!({
            "platformName": "iOS",
            "appium:automationName": "XCUITest",
        });
        if let Some(app_id) = &self.config.app_id {
            capabilities["appium:bundleId"] = json!(app_id);
        }
        capabilities
    }

    fn stored_viewport(&self) -> Option<DeviceViewport> {
        *self.viewport.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn connect(&self) -> Result<()> {
        let capabilities = self.capabilities();
        let session_id = retry(CONNECT_ATTEMPTS, || {
            self.session.create(capabilities.clone())
        })
        .await
        .map_err(|error| DriverError::InitializationFailed {
            attempts: CONNECT_ATTEMPTS,
            source: Box::new(error),
        })?;
        info!("[IosDriver] Connected to XCUITest session {}", session_id);

        let device = self.session.window_rect().await?;
        info!(
            "[IosDriver] Device viewport is {}x{}",
            device.width, device.height
        );
        *self
            .viewport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(device);

        ensure_screenshots_dir(&self.config.resolved_working_dir()?).await?;

        if let Some(app_id) = &self.config.app_id {
            self.session
                .activate_app(json!({ "bundleId": app_id }))
                .await?;
            info!("[IosDriver] Activated app {}", app_id);
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for IosDriver {
    fn platform(&self) -> Platform {
        Platform::Ios
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

        self.state.set(DriverState::Initializing);
        match self.connect().await {
            Ok(()) => {
                self.state.set(DriverState::Ready);
                Ok(())
            }
            Err(error) => {
                self.state.set(DriverState::Uninitialized);
                Err(error)
            }
        }
    }

    async fn create_browser(&self) -> Result<Arc<dyn Browser>> {
        self.state.require_ready()?;

        let viewport = self
            .stored_viewport()
            .ok_or(DriverError::DeviceInfoUnavailable)?;
        let working_dir = self.config.resolved_working_dir()?;
        let browser = IosBrowser::new(Arc::clone(&self.session), viewport, working_dir);

        self.registry.insert(browser.clone());
        info!(
            "[IosDriver] Browser session with ID {} created successfully.",
            browser.id()
        );
        Ok(browser)
    }

    async fn close_browser(&self, id: &str) -> Result<()> {
        self.state.require_ready()?;
        self.registry.close(id).await?;
        info!("[IosDriver] Browser session with ID {} closed.", id);
        Ok(())
    }

    fn device_info(&self) -> Result<DeviceViewport> {
        self.stored_viewport()
            .ok_or(DriverError::DeviceInfoUnavailable)
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
                    "[IosDriver] Failed to destroy browser {}: {}",
                    browser.id(),
                    error
                );
            }
        }

        if let Err(error) = self.session.delete().await {
            debug!("[IosDriver] Session already released: {}", error);
        }

        info!("[IosDriver] Destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> DriverConfig {
        DriverConfig {
            platform: Platform::Ios,
            automation_server_url: "http://127.0.0.1:1".to_string(),
            working_dir: Some(std::env::temp_dir()),
            ..Default::default()
        }
    }

    #[test]
    fn test_capabilities_use_bundle_id() {
        let mut config = offline_config();
        config.app_id = Some("com.example.App".to_string());
        let driver = IosDriver::new(config).unwrap();

        let capabilities = driver.capabilities();
        assert_eq!(capabilities["platformName"], "iOS");
        assert_eq!(capabilities["appium:automationName"], "XCUITest");
        assert_eq!(capabilities["appium:bundleId"], "com.example.App");
        assert!(capabilities.get("appium:appPackage").is_none());
    }

    #[tokio::test]
    async fn test_failed_init_returns_to_uninitialized() {
        let driver = IosDriver::new(offline_config()).unwrap();

        let error = driver.init().await.unwrap_err();
        assert!(matches!(
            error,
            DriverError::InitializationFailed {
                attempts: CONNECT_ATTEMPTS,
                ..
            }
        ));
        assert_eq!(driver.state(), DriverState::Uninitialized);
    }

    #[test]
    fn test_device_info_requires_init() {
        let driver = IosDriver::new(offline_config()).unwrap();
        assert!(matches!(
            driver.device_info(),
            Err(DriverError::DeviceInfoUnavailable)
        ));
    }

    /// Requires an Appium server with a connected iOS device or simulator.
    #[tokio::test]
    #[ignore]
    async fn test_live_device_session() {
        let config = DriverConfig {
            automation_server_url: "http://localhost:4723".to_string(),
            ..offline_config()
        };
        let driver = IosDriver::new(config).unwrap();
        driver.init().await.unwrap();

        let browser = driver.create_browser().await.unwrap();
        let result = browser.screenshot().await.unwrap();
        assert!(result.message.contains("Screenshot"));

        driver.destroy().await.unwrap();
    }
}
