//! iOS browser variant
//!
//! Same shape as the Android variant, over an XCUITest session. The
//! gesture vocabulary differs: XCUITest taps with "mobile: tap".

use crate::action::{ActionResult, NavigateOptions, Platform};
use crate::contract::Browser;
use crate::error::Result;
use crate::mobile::{MobileCore, MobileSession};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use vision::DeviceViewport;

pub struct IosBrowser {
    core: MobileCore,
}

impl IosBrowser {
    pub fn new(
        session: Arc<MobileSession>,
        viewport: DeviceViewport,
        working_dir: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: MobileCore::new(
                Platform::Ios,
                "IosBrowser",
                "mobile: tap",
                session,
                viewport,
                working_dir,
            ),
        })
    }
}

#[async_trait]
impl Browser for IosBrowser {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn platform(&self) -> Platform {
        Platform::Ios
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

    #[tokio::test]
    async fn test_unsupported_results_name_the_platform() {
        let session = Arc::new(MobileSession::new(
            Url::parse("http://localhost:4723").unwrap(),
        ));
        let browser = IosBrowser::new(session, DeviceViewport::new(390, 844), std::env::temp_dir());

        let result = browser.type_text("hello").await.unwrap();
        assert_eq!(result.message, "type_text is not supported on ios");

        let result = browser.cleanup().await.unwrap();
        assert_eq!(result.message, "cleanup is not supported on ios");
        assert_eq!(browser.platform(), Platform::Ios);
    }
}
