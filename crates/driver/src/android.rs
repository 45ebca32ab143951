//! Android platform driver.
//!
//! Owns one UiAutomator2 session on an Appium server. `init` connects with
//! bounded retry, reads the device's real viewport, and optionally brings
//! the app under test to the foreground. Browsers created afterwards all
//! share that one device session.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use browser::screenshots::ensure_screenshots_dir;
use browser::{retry, AndroidBrowser, Browser, MobileSession, Platform};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;
use vision::DeviceViewport;

use crate::config::DriverConfig;
use crate::contract::{Driver, DriverState, StateCell};
use crate::error::{DriverError, Result};
use crate::registry::BrowserRegistry;

/// Session creation is attempted twice before giving up.
pub(crate) const CONNECT_ATTEMPTS: usize = 2;

pub struct AndroidDriver {
    config: DriverConfig,
    session: Arc<MobileSession>,
    registry: BrowserRegistry,
    state: StateCell,
    /// Real device dimensions, read from the session during `init`.
    viewport: RwLock<Option<DeviceViewport>>,
}

impl AndroidDriver {
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
            "platformName": "Android",
            "appium:automationName": "UiAutomator2",
        });
        if let Some(app_id) = &self.config.app_id {
            capabilities["appium:appPackage"] = json!(app_id);
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
        info!(
            "[AndroidDriver] Connected to UiAutomator2 session {}",
            session_id
        );

        let device = self.session.window_rect().await?;
        info!(
            "[AndroidDriver] Device viewport is {}x{}",
            device.width, device.height
        );
        *self
            .viewport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(device);

        ensure_screenshots_dir(&self.config.resolved_working_dir()?).await?;

        if let Some(app_id) = &self.config.app_id {
            self.session
                .activate_app(json!({ "appId": app_id }))
                .await?;
            info!("[AndroidDriver] Activated app {}", app_id);
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for AndroidDriver {
    fn platform(&self) -> Platform {
        Platform::Android
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
            // A failed init is retryable, not fatal.
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
        let browser = AndroidBrowser::new(Arc::clone(&self.session), viewport, working_dir);

        self.registry.insert(browser.clone());
        info!(
            "[AndroidDriver] Browser session with ID {} created successfully.",
            browser.id()
        );
        Ok(browser)
    }

    async fn close_browser(&self, id: &str) -> Result<()> {
        self.state.require_ready()?;
        self.registry.close(id).await?;
        info!("[AndroidDriver] Browser session with ID {} closed.", id);
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
                    "[AndroidDriver] Failed to destroy browser {}: {}",
                    browser.id(),
                    error
                );
            }
        }

        // Browsers share the device session, so the first teardown above
        // already deleted it; a second delete reports no session.
        if let Err(error) = self.session.delete().await {
            debug!("[AndroidDriver] Session already released: {}", error);
        }

        info!("[AndroidDriver] Destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> DriverConfig {
        DriverConfig {
            platform: Platform::Android,
            // Nothing listens here; connection attempts fail immediately.
            automation_server_url: "http://127.0.0.1:1".to_string(),
            working_dir: Some(std::env::temp_dir()),
            ..Default::default()
        }
    }

    #[test]
    fn test_capabilities_include_app_package_when_configured() {
        let mut config = offline_config();
        config.app_id = Some("com.example.app".to_string());
        let driver = AndroidDriver::new(config).unwrap();

        let capabilities = driver.capabilities();
        assert_eq!(capabilities["platformName"], "Android");
        assert_eq!(capabilities["appium:automationName"], "UiAutomator2");
        assert_eq!(capabilities["appium:appPackage"], "com.example.app");

        let bare = AndroidDriver::new(offline_config()).unwrap();
        assert!(bare.capabilities().get("appium:appPackage").is_none());
    }

    #[test]
    fn test_device_info_requires_init() {
        let driver = AndroidDriver::new(offline_config()).unwrap();
        let error = driver.device_info().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Device information not available. Ensure that init() is called first."
        );
    }

    #[tokio::test]
    async fn test_create_browser_requires_init() {
        let driver = AndroidDriver::new(offline_config()).unwrap();
        assert!(matches!(
            driver.create_browser().await,
            Err(DriverError::NotReady {
                state: DriverState::Uninitialized
            })
        ));
    }

    #[tokio::test]
    async fn test_init_exhausts_connect_attempts_then_stays_retryable() {
        let driver = AndroidDriver::new(offline_config()).unwrap();

        let error = driver.init().await.unwrap_err();
        assert!(matches!(
            error,
            DriverError::InitializationFailed {
                attempts: CONNECT_ATTEMPTS,
                ..
            }
        ));
        // Back to square one, not bricked.
        assert_eq!(driver.state(), DriverState::Uninitialized);
        assert!(driver.init().await.is_err());
    }

    #[test]
    fn test_invalid_server_url_is_rejected_up_front() {
        let config = DriverConfig {
            automation_server_url: "not a url".to_string(),
            ..offline_config()
        };
        assert!(matches!(
            AndroidDriver::new(config),
            Err(DriverError::Url(_))
        ));
    }

    /// Requires an Appium server with a connected Android device.
    #[tokio::test]
    #[ignore]
    async fn test_live_device_session() {
        let config = DriverConfig {
            automation_server_url: "http://localhost:4723".to_string(),
            ..offline_config()
        };
        let driver = AndroidDriver::new(config).unwrap();
        driver.init().await.unwrap();

        let device = driver.device_info().unwrap();
        assert!(device.width > 0 && device.height > 0);

        let browser = driver.create_browser().await.unwrap();
        browser.click(Some(100.0), Some(200.0)).await.unwrap();
        driver.close_browser(browser.id()).await.unwrap();

        driver.destroy().await.unwrap();
    }
}
