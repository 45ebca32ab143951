//! Android browser variant
//!
//! Drives a device through a UiAutomator2 session. Only the actions that
//! make sense on a device screen are real; the rest resolve to an
//! explicit unsupported result so the action contract stays total.

use crate::action::{ActionResult, NavigateOptions, Platform};
use crate::contract::Browser;
use crate::error::Result;
use crate::mobile::{MobileCore, MobileSession};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use vision::DeviceViewport;

pub struct AndroidBrowser {
    core: MobileCore,
}

impl AndroidBrowser {
    pub fn new(
        session: Arc<MobileSession>,
        viewport: DeviceViewport,
        working_dir: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: MobileCore::new(
                Platform::Android,
                "AndroidBrowser",
                "mobile: clickGesture",
                session,
                viewport,
                working_dir,
            ),
        })
    }
}

#[async_trait]
impl Browser for AndroidBrowser {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn navigate(&self, _url: &str, _options: NavigateOptions) -> Result<ActionResult> {
        self.core.unsupported("navigate")
    }

    async fn click(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult> {
        self.core.tap(x, y).await
    }

    async fn move_cursor(&self, _x: Option<f64>, _y: Option<f64>) -> Result<ActionResult> {
        self.core.unsupported("move_cursor")
    }

    async fn drag(&self, _x: Option<f64>, _y: Option<f64>) -> Result<ActionResult> {
        self.core.unsupported("drag")
    }

    async fn press_key(&self, _keys: &[String]) -> Result<ActionResult> {
        self.core.unsupported("press_key")
    }

    async fn type_text(&self, _text: &str) -> Result<ActionResult> {
        self.core.unsupported("type_text")
    }

    async fn scroll(&self, _direction: &str) -> Result<ActionResult> {
        self.core.unsupported("scroll")
    }

    async fn screenshot(&self) -> Result<ActionResult> {
        self.core.capture_screenshot().await
    }

    async fn locate_at(&self, _x: f64, _y: f64) -> Result<ActionResult> {
        self.core.unsupported("locate_at")
    }

    async fn sleep(&self, duration_ms: Option<u64>) -> Result<ActionResult> {
        self.core.pause(duration_ms).await
    }

    async fn get_state(&self) -> Result<ActionResult> {
        self.core.state_action().await
    }

    async fn cleanup(&self) -> Result<ActionResult> {
        self.core.unsupported("cleanup")
    }

    async fn destroy(&self) -> Result<()> {
        self.core.teardown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn offline_browser() -> Arc<AndroidBrowser> {
        let session = Arc::new(MobileSession::new(
            Url::parse("http://localhost:4723").unwrap(),
        ));
        AndroidBrowser::new(session, DeviceViewport::new(411, 889), std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_web_only_actions_report_unsupported() {
        let browser = offline_browser();

        let result = browser
            .navigate("https://example.com", NavigateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.message, "navigate is not supported on android");

        let result = browser.locate_at(10.0, 20.0).await.unwrap();
        assert_eq!(result.message, "locate_at is not supported on android");

        let result = browser.scroll("down").await.unwrap();
        assert_eq!(result.message, "scroll is not supported on android");
    }

    #[tokio::test]
    async fn test_identity() {
        let browser = offline_browser();
        assert_eq!(browser.platform(), Platform::Android);
        assert!(!browser.id().is_empty());
    }
}
