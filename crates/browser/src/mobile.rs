//! Mobile automation session over the W3C WebDriver HTTP protocol
//!
//! Android and iOS sessions talk to an Appium-compatible server. Only the
//! endpoints the mobile actions need are wrapped; everything speaks the
//! standard `{"value": ...}` envelope. [`MobileCore`] layers the shared
//! mobile action behavior on top; the per-platform browsers wrap it with
//! their own gesture script and platform tag.

use crate::action::{
    ActionMetadata, ActionPayload, ActionResult, BrowserState, CursorPosition, CursorState,
    Platform, WindowState,
};
use crate::contract::bounded_sleep;
use crate::error::{BrowserError, Result};
use crate::screenshots::save_screenshot;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;
use vision::{DeviceViewport, ImageDimension};

/// Settle time after a tap. Device UIs animate slowly compared to web
/// pages, so the pause is generous.
const TAP_SETTLE: Duration = Duration::from_millis(5000);

/// One device session against an automation server. Created lazily by the
/// driver; every endpoint except `create` requires the session to exist.
pub struct MobileSession {
    http: reqwest::Client,
    server_url: Url,
    session_id: RwLock<Option<String>>,
}

impl MobileSession {
    pub fn new(server_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url,
            session_id: RwLock::new(None),
        }
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// Create the device session, or return the existing one.
    pub async fn create(&self, capabilities: Value) -> Result<String> {
        if let Some(existing) = self.session_id.read().await.clone() {
            debug!(
                "[MobileSession] Session {} already created. Reusing it.",
                existing
            );
            return Ok(existing);
        }

        let url = self.server_url.join("session")?;
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let value = self.send(self.http.post(url).json(&body)).await?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BrowserError::AutomationServer("session response missing sessionId".into())
            })?
            .to_string();

        info!("[MobileSession] Created session {}", id);
        *self.session_id.write().await = Some(id.clone());
        Ok(id)
    }

    /// Run a mobile script command ("mobile: clickGesture" and friends).
    pub async fn execute_script(&self, script: &str, args: Value) -> Result<Value> {
        let url = self.session_url("execute/sync").await?;
        let body = json!({ "script": script, "args": args });
        self.send(self.http.post(url).json(&body)).await
    }

    /// Capture the device screen as base64-encoded PNG.
    pub async fn screenshot(&self) -> Result<String> {
        let url = self.session_url("screenshot").await?;
        let value = self.send(self.http.get(url)).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                BrowserError::AutomationServer("screenshot response was not a string".into())
            })
    }

    /// Size of the device window.
    pub async fn window_rect(&self) -> Result<DeviceViewport> {
        let url = self.session_url("window/rect").await?;
        let value = self.send(self.http.get(url)).await?;
        match (
            value.get("width").and_then(Value::as_u64),
            value.get("height").and_then(Value::as_u64),
        ) {
            (Some(width), Some(height)) => {
                Ok(DeviceViewport::new(width as u32, height as u32))
            }
            _ => Err(BrowserError::AutomationServer(
                "window rect response missing dimensions".into(),
            )),
        }
    }

    /// Bring an installed app to the foreground. The payload names the
    /// app in platform terms (`appId` on Android, `bundleId` on iOS).
    pub async fn activate_app(&self, payload: Value) -> Result<()> {
        let url = self.session_url("appium/device/activate_app").await?;
        self.send(self.http.post(url).json(&payload)).await?;
        Ok(())
    }

    /// End the device session.
    pub async fn delete(&self) -> Result<()> {
        let id = self.require_session().await?;
        let url = self.server_url.join(&format!("session/{id}"))?;
        self.send(self.http.delete(url)).await?;
        *self.session_id.write().await = None;
        info!("[MobileSession] Deleted session {}", id);
        Ok(())
    }

    async fn require_session(&self) -> Result<String> {
        self.session_id
            .read()
            .await
            .clone()
            .ok_or(BrowserError::SessionNotInitialized)
    }

    async fn session_url(&self, endpoint: &str) -> Result<Url> {
        let id = self.require_session().await?;
        Ok(self.server_url.join(&format!("session/{id}/{endpoint}"))?)
    }

    /// Send a request and unwrap the W3C `value` envelope, converting
    /// non-success statuses into automation server errors.
    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        let value = body.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown automation server error");
            return Err(BrowserError::AutomationServer(format!(
                "{status}: {message}"
            )));
        }

        Ok(value)
    }
}

/// Shared behavior of the mobile browser variants. Holds everything
/// except the platform-specific gesture vocabulary.
pub(crate) struct MobileCore {
    pub(crate) id: String,
    platform: Platform,
    /// Component name used in log lines.
    component: &'static str,
    /// Script command that performs a tap on this platform.
    tap_script: &'static str,
    session: Arc<MobileSession>,
    viewport: DeviceViewport,
    working_dir: PathBuf,
    cursor: RwLock<CursorPosition>,
    destroyed: AtomicBool,
}

impl MobileCore {
    pub(crate) fn new(
        platform: Platform,
        component: &'static str,
        tap_script: &'static str,
        session: Arc<MobileSession>,
        viewport: DeviceViewport,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            platform,
            component,
            tap_script,
            session,
            viewport,
            working_dir,
            cursor: RwLock::new(CursorPosition::default()),
            destroyed: AtomicBool::new(false),
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(BrowserError::SessionNotInitialized);
        }
        Ok(())
    }

    fn fail(&self, error: BrowserError) -> BrowserError {
        error!("[{}] {}", self.component, error.cause_chain());
        error
    }

    pub(crate) fn unsupported(&self, action: &str) -> Result<ActionResult> {
        self.ensure_alive()?;
        Ok(ActionResult::unsupported(action, self.platform))
    }

    pub(crate) async fn tap(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult> {
        self.ensure_alive()?;
        let (x, y) = match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => (x, y),
            _ => {
                let remembered = *self.cursor.read().await;
                warn!(
                    "[{}] No coordinates provided. Using last remembered cursor position {} {}",
                    self.component, remembered.x, remembered.y
                );
                (remembered.x, remembered.y)
            }
        };

        self.session
            .execute_script(self.tap_script, json!([{ "x": x, "y": y }]))
            .await
            .map_err(|e| {
                self.fail(BrowserError::action_with_context(
                    "tap",
                    e,
                    json!({ "x": x, "y": y }),
                ))
            })?;
        *self.cursor.write().await = CursorPosition { x, y };

        tokio::time::sleep(TAP_SETTLE).await;
        let metadata = ActionMetadata {
            browser_state: Some(self.state().await),
            x: Some(x),
            y: Some(y),
        };

        Ok(ActionResult::message(format!("Tap performed at ({x}, {y})")).with_metadata(metadata))
    }

    pub(crate) async fn capture_screenshot(&self) -> Result<ActionResult> {
        self.ensure_alive()?;
        let base64_image = self
            .session
            .screenshot()
            .await
            .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?;
        let bytes = BASE64
            .decode(&base64_image)
            .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?;

        let path = save_screenshot(&self.working_dir, &bytes)
            .await
            .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?;
        info!("[{}] Screenshot saved to {}", self.component, path.display());

        Ok(ActionResult::message("Screenshot taken")
            .with_payload(ActionPayload::Screenshot { base64_image })
            .with_metadata(ActionMetadata::with_state(self.state().await)))
    }

    /// Device state is what the driver learned at init time plus the
    /// position of the last tap. Mobile sessions have no URL or title.
    pub(crate) async fn state(&self) -> BrowserState {
        BrowserState {
            window: Some(WindowState {
                url: None,
                title: None,
                size: Some(ImageDimension::new(self.viewport.width, self.viewport.height)),
            }),
            cursor: Some(CursorState {
                position: *self.cursor.read().await,
            }),
        }
    }

    pub(crate) async fn state_action(&self) -> Result<ActionResult> {
        self.ensure_alive()?;
        Ok(ActionResult::message("State retrieved.").with_payload(ActionPayload::State {
            state: self.state().await,
        }))
    }

    pub(crate) async fn pause(&self, duration_ms: Option<u64>) -> Result<ActionResult> {
        self.ensure_alive()?;
        Ok(bounded_sleep(self.component, duration_ms).await)
    }

    pub(crate) async fn teardown(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Err(BrowserError::SessionNotInitialized);
        }
        self.session.delete().await?;
        info!("[{}] Browser {} destroyed", self.component, self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_session() -> MobileSession {
        MobileSession::new(Url::parse("http://localhost:4723").unwrap())
    }

    fn offline_core() -> MobileCore {
        MobileCore::new(
            Platform::Android,
            "AndroidBrowser",
            "mobile: clickGesture",
            Arc::new(offline_session()),
            DeviceViewport::new(411, 889),
            std::env::temp_dir(),
        )
    }

    #[tokio::test]
    async fn test_unsupported_actions_resolve_not_fail() {
        let core = offline_core();
        let result = core.unsupported("navigate").unwrap();
        assert_eq!(result.message, "navigate is not supported on android");
    }

    #[tokio::test]
    async fn test_tap_without_session_reports_the_cause() {
        let core = offline_core();
        let err = core.tap(Some(10.0), Some(20.0)).await.unwrap_err();
        assert_eq!(err.cause_chain(), "Failed to tap: Session not initialized");
    }

    #[tokio::test]
    async fn test_state_reports_device_viewport_and_cursor() {
        let core = offline_core();
        let result = core.state_action().await.unwrap();
        assert_eq!(result.message, "State retrieved.");
        match result.payload {
            Some(ActionPayload::State { state }) => {
                let window = state.window.unwrap();
                assert_eq!(window.size, Some(ImageDimension::new(411, 889)));
                assert!(window.url.is_none());
                assert_eq!(state.cursor.unwrap().position, CursorPosition::default());
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_teardown_marks_the_browser_destroyed() {
        let core = offline_core();
        // No live session to delete, so teardown itself errors, but the
        // browser still refuses further actions.
        assert!(core.teardown().await.is_err());
        let err = core.state_action().await.unwrap_err();
        assert!(matches!(err, BrowserError::SessionNotInitialized));
    }

    #[tokio::test]
    async fn test_endpoints_require_a_session() {
        let session = offline_session();

        let err = session.screenshot().await.unwrap_err();
        assert!(matches!(err, BrowserError::SessionNotInitialized));

        let err = session.window_rect().await.unwrap_err();
        assert!(matches!(err, BrowserError::SessionNotInitialized));

        let err = session
            .execute_script("mobile: clickGesture", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::SessionNotInitialized));

        let err = session.delete().await.unwrap_err();
        assert!(matches!(err, BrowserError::SessionNotInitialized));
    }

    #[tokio::test]
    async fn test_session_urls_nest_under_the_server() {
        let session = offline_session();
        *session.session_id.write().await = Some("abc123".into());

        let url = session.session_url("window/rect").await.unwrap();
        assert_eq!(url.as_str(), "http://localhost:4723/session/abc123/window/rect");
    }

    // Needs an Appium server with a connected device.
    #[tokio::test]
    #[ignore]
    async fn test_create_and_delete_against_live_server() {
        let session = offline_session();
        let caps = json!({
            "platformName": "Android",
            "appium:automationName": "UiAutomator2",
        });
        let id = session.create(caps).await.unwrap();
        assert!(!id.is_empty());

        let rect = session.window_rect().await.unwrap();
        assert!(rect.width > 0 && rect.height > 0);

        session.delete().await.unwrap();
    }
}
