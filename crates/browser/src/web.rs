//! Web browser variant, driven over CDP
//!
//! One instance owns a dedicated browser context inside a shared Chrome
//! connection. Every navigation opens a new page; the newest page is the
//! one actions operate on. Coordinates are device pixels; callers working
//! in padded-canvas space map through the vision pipeline first.

use crate::action::{
    ActionMetadata, ActionPayload, ActionResult, BrowserState, CursorPosition, CursorState,
    NavigateOptions, Platform, ScrollDirection, WindowState, NAVIGATION_TIMEOUT_MS,
};
use crate::cdp::protocol::CreateTargetResult;
use crate::cdp::{CdpClient, CdpError, CdpPage};
use crate::contract::{bounded_sleep, Browser};
use crate::cursor;
use crate::error::{BrowserError, Result};
use crate::screenshots::{ensure_screenshots_dir, save_screenshot};
use crate::stability::StabilityDetector;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;
use vision::{DeviceViewport, ImageDimension, VisionPipeline};

/// Settle time between a click and the post-click state probe.
const CLICK_SETTLE: Duration = Duration::from_millis(500);

/// Breathing room around keyboard input.
const KEY_SETTLE: Duration = Duration::from_millis(100);

/// Pixels one scroll action moves the content.
const SCROLL_STEP_PX: f64 = 400.0;

/// Walks from the element under a point to a compact normalized HTML
/// snippet: deepest child, up to two parent hops for context, all
/// attributes stripped except the ones that identify the element.
/// Invoked as `LOCATE_COMPONENT_JS(x, y)`.
const LOCATE_COMPONENT_JS: &str = r#"
((x, y) => {
  const allowedAttr = [
    "type",
    "name",
    "placeholder",
    "aria-label",
    "role",
    "title",
    "alt",
    "d",
  ];
  const elem = document.elementFromPoint(x, y);
  if (!elem) return "";
  const clone = elem.cloneNode(true);

  const deepestChild = (element) => {
    let deepest = element;
    let maxDepth = 0;
    const walk = (node, depth) => {
      if (depth > maxDepth) {
        maxDepth = depth;
        deepest = node;
      }
      Array.from(node.children).forEach((child) => walk(child, depth + 1));
    };
    walk(element, 0);
    return deepest;
  };

  const leaf = deepestChild(clone);
  const node = leaf.parentElement
    ? leaf.parentElement.parentElement
      ? leaf.parentElement.parentElement
      : leaf.parentElement
    : leaf;

  const cleanAttributes = (element) => {
    Array.from(element.attributes).forEach((attr) => {
      if (!allowedAttr.includes(attr.name)) element.removeAttribute(attr.name);
    });
    Array.from(element.children).forEach((child) => cleanAttributes(child));
  };
  cleanAttributes(node);

  return node.outerHTML.trim().replace(/\s+/g, " ");
})
"#;

/// Accept full http(s) URLs as-is and upgrade bare hosts ("example.com",
/// "localhost:3000") by assuming https.
pub(crate) fn parse_url_lenient(raw: &str) -> std::result::Result<Url, url::ParseError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "about" | "file") => Ok(url),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{raw}"))
        }
        Err(e) => Err(e),
    }
}

pub struct WebBrowser {
    id: String,
    client: Arc<CdpClient>,
    browser_context_id: String,
    viewport: DeviceViewport,
    working_dir: PathBuf,
    normalize_screenshots: bool,
    pipeline: VisionPipeline,
    stability: StabilityDetector,
    /// Open pages, oldest first. Actions target the newest.
    pages: RwLock<Vec<Arc<CdpPage>>>,
    /// Last pointer position; click falls back to it.
    cursor: RwLock<CursorPosition>,
    /// Cursor re-install tasks, aborted on destroy.
    init_tasks: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl WebBrowser {
    /// Create a browser backed by its own browser context. No page is
    /// opened yet; the first `navigate` does that.
    pub async fn create(
        client: Arc<CdpClient>,
        viewport: DeviceViewport,
        working_dir: PathBuf,
        normalize_screenshots: bool,
    ) -> Result<Arc<Self>> {
        let result = client
            .send_request("Target.createBrowserContext", None, None)
            .await?;
        let browser_context_id = result
            .get("browserContextId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BrowserError::Cdp(CdpError::Protocol {
                    code: -1,
                    message: "Target.createBrowserContext returned no browserContextId".into(),
                })
            })?
            .to_string();

        ensure_screenshots_dir(&working_dir).await?;

        Ok(Arc::new(Self {
            id: Uuid::now_v7().to_string(),
            client,
            browser_context_id,
            viewport,
            working_dir,
            normalize_screenshots,
            pipeline: VisionPipeline::new(),
            stability: StabilityDetector::default(),
            pages: RwLock::new(Vec::new()),
            cursor: RwLock::new(CursorPosition::default()),
            init_tasks: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }))
    }

    /// Pipeline holding the latest normalized screenshot. Callers use it
    /// to map model-reported canvas coordinates to device pixels before
    /// issuing pointer actions.
    pub fn pipeline(&self) -> &VisionPipeline {
        &self.pipeline
    }

    pub fn viewport(&self) -> DeviceViewport {
        self.viewport
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(BrowserError::SessionNotInitialized);
        }
        Ok(())
    }

    /// Log the full cause chain before propagating an action failure.
    fn fail(&self, error: BrowserError) -> BrowserError {
        error!("[WebBrowser] {}", error.cause_chain());
        error
    }

    async fn current_page(&self) -> Result<Arc<CdpPage>> {
        self.pages
            .read()
            .await
            .last()
            .cloned()
            .ok_or(BrowserError::NoActivePage)
    }

    async fn new_page(&self) -> Result<Arc<CdpPage>> {
        let result = self
            .client
            .send_request(
                "Target.createTarget",
                Some(json!({
                    "url": "about:blank",
                    "browserContextId": self.browser_context_id,
                })),
                None,
            )
            .await?;
        let created: CreateTargetResult =
            serde_json::from_value(result).map_err(CdpError::Json)?;

        let page = CdpPage::attach(self.client.clone(), created.target_id).await?;
        page.set_viewport(self.viewport.width, self.viewport.height)
            .await?;
        self.pages.write().await.push(page.clone());
        Ok(page)
    }

    /// Post-navigation initialization: cursor overlay now plus a watcher
    /// that re-installs it after every later load.
    async fn init_page(&self, page: &Arc<CdpPage>) {
        cursor::initialize_cursor(page).await;
        let handle = cursor::spawn_reinstall_task(page.clone());
        self.init_tasks.lock().await.push(handle);
    }

    fn require_coords(
        &self,
        x: Option<f64>,
        y: Option<f64>,
        action: &'static str,
        reason: &'static str,
    ) -> Result<(f64, f64)> {
        match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok((x, y)),
            _ => Err(self.fail(BrowserError::action_with_context(
                action,
                reason,
                json!({ "x": x, "y": y }),
            ))),
        }
    }

    async fn window_state(&self, page: &CdpPage) -> Option<WindowState> {
        let info = page.target_info().await.ok()?;
        let size = match page.layout_viewport().await {
            Ok(viewport) => ImageDimension::new(viewport.client_width, viewport.client_height),
            Err(_) => ImageDimension::new(self.viewport.width, self.viewport.height),
        };
        Some(WindowState {
            url: Some(info.url),
            title: Some(info.title),
            size: Some(size),
        })
    }

    /// Full state snapshot: window info, then a stability wait, then the
    /// cursor overlay position (falling back to the remembered one).
    async fn probe_state(&self) -> Result<BrowserState> {
        let page = self.current_page().await?;
        let window = self.window_state(&page).await;
        self.stability.wait_for_stable(&page).await?;

        let position = match cursor::cursor_position(&page).await {
            Some((x, y)) => CursorPosition { x, y },
            None => *self.cursor.read().await,
        };

        Ok(BrowserState {
            window,
            cursor: Some(CursorState { position }),
        })
    }
}

#[async_trait]
impl Browser for WebBrowser {
    fn id(&self) -> &str {
        &self.id
    }

    fn platform(&self) -> Platform {
        Platform::Web
    }

    async fn navigate(&self, url: &str, options: NavigateOptions) -> Result<ActionResult> {
        self.ensure_alive()?;
        let target = parse_url_lenient(url).map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "navigate",
                e,
                json!({ "url": url }),
            ))
        })?;

        let page = self
            .new_page()
            .await
            .map_err(|e| self.fail(BrowserError::action_with_context("navigate", e, json!({ "url": url }))))?;

        page.navigate(target.as_str(), Duration::from_millis(NAVIGATION_TIMEOUT_MS))
            .await
            .map_err(|e| {
                self.fail(BrowserError::action_with_context(
                    "navigate",
                    e,
                    json!({ "url": url, "options": options }),
                ))
            })?;

        if options.should_initialize {
            self.init_page(&page).await;
        }

        info!("[WebBrowser] Navigation to {} complete", target);
        let window = self.window_state(&page).await;
        Ok(
            ActionResult::message("Navigation successful.").with_metadata(
                ActionMetadata::with_state(BrowserState {
                    window,
                    cursor: None,
                }),
            ),
        )
    }

    async fn click(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult> {
        self.ensure_alive()?;
        let page = self
            .current_page()
            .await
            .map_err(|e| self.fail(BrowserError::action("click", e)))?;

        let (x, y) = match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => (x, y),
            _ => {
                let remembered = *self.cursor.read().await;
                warn!(
                    "[WebBrowser] No coordinates provided. Using last remembered cursor position {} {}",
                    remembered.x, remembered.y
                );
                (remembered.x, remembered.y)
            }
        };

        cursor::move_overlay(&page, x, y).await;
        let clicked = async {
            page.dispatch_mouse_move(x, y).await?;
            page.dispatch_click(x, y).await
        };
        clicked.await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "click",
                e,
                json!({ "x": x, "y": y }),
            ))
        })?;
        *self.cursor.write().await = CursorPosition { x, y };

        // Let the page react before snapshotting; a failed snapshot does
        // not fail the click.
        tokio::time::sleep(CLICK_SETTLE).await;
        let mut metadata = ActionMetadata::at(x, y);
        match self.probe_state().await {
            Ok(state) => metadata.browser_state = Some(state),
            Err(e) => warn!(
                "[WebBrowser] Failed to capture state after click: {}",
                e.cause_chain()
            ),
        }

        Ok(ActionResult::message(format!("Mouse clicked at ({x}, {y})")).with_metadata(metadata))
    }

    async fn move_cursor(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult> {
        self.ensure_alive()?;
        let (x, y) =
            self.require_coords(x, y, "move cursor", "Coordinates required for mouse_move")?;
        let page = self
            .current_page()
            .await
            .map_err(|e| self.fail(BrowserError::action("move cursor", e)))?;

        page.dispatch_mouse_move(x, y).await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "move cursor",
                e,
                json!({ "x": x, "y": y }),
            ))
        })?;
        cursor::move_overlay(&page, x, y).await;
        *self.cursor.write().await = CursorPosition { x, y };

        Ok(ActionResult::message(format!("Cursor moved to {x} {y}.")))
    }

    async fn drag(&self, x: Option<f64>, y: Option<f64>) -> Result<ActionResult> {
        self.ensure_alive()?;
        let (x, y) = self.require_coords(x, y, "drag", "No coordinates provided.")?;
        let page = self
            .current_page()
            .await
            .map_err(|e| self.fail(BrowserError::action("drag", e)))?;

        let from = *self.cursor.read().await;
        let dragged = async {
            page.mouse_down(from.x, from.y).await?;
            page.dispatch_mouse_move(x, y).await?;
            page.mouse_up(x, y).await
        };
        dragged.await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "drag",
                e,
                json!({ "x": x, "y": y }),
            ))
        })?;
        cursor::move_overlay(&page, x, y).await;
        *self.cursor.write().await = CursorPosition { x, y };

        Ok(ActionResult::message("Element dragged.").with_metadata(ActionMetadata::at(x, y)))
    }

    async fn press_key(&self, keys: &[String]) -> Result<ActionResult> {
        self.ensure_alive()?;
        if keys.is_empty() {
            return Err(self.fail(BrowserError::action(
                "press key",
                "Key required for press_key action",
            )));
        }
        let page = self.current_page().await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "press key",
                e,
                json!({ "keys": keys }),
            ))
        })?;

        tokio::time::sleep(KEY_SETTLE).await;
        let pressed = async {
            if let [key] = keys {
                page.press_key(key).await
            } else {
                // Hold every key but the last, press the last, release in
                // reverse order, accumulating the modifier mask as held
                // keys stack up.
                let (held, last) = keys.split_at(keys.len() - 1);
                let mut modifiers = 0;
                for key in held {
                    modifiers |= page.key_down(key, modifiers).await?;
                }
                page.key_down(&last[0], modifiers).await?;
                page.key_up(&last[0], modifiers).await?;
                for key in held.iter().rev() {
                    page.key_up(key, modifiers).await?;
                }
                Ok(())
            }
        };
        pressed.await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "press key",
                e,
                json!({ "keys": keys }),
            ))
        })?;
        tokio::time::sleep(KEY_SETTLE).await;

        Ok(ActionResult::message(format!(
            "Pressed key: {}",
            keys.join("+")
        )))
    }

    async fn type_text(&self, text: &str) -> Result<ActionResult> {
        self.ensure_alive()?;
        if text.trim().is_empty() {
            return Err(self.fail(BrowserError::action(
                "type text",
                "Text required for type action",
            )));
        }
        let page = self
            .current_page()
            .await
            .map_err(|e| self.fail(BrowserError::action("type text", e)))?;

        tokio::time::sleep(KEY_SETTLE).await;
        page.insert_text(text).await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "type text",
                e,
                json!({ "text": text }),
            ))
        })?;
        tokio::time::sleep(KEY_SETTLE).await;

        Ok(ActionResult::message(format!("Typed: {text}")))
    }

    async fn scroll(&self, direction: &str) -> Result<ActionResult> {
        self.ensure_alive()?;
        let logical: ScrollDirection = direction.parse().map_err(|e| self.fail(e))?;
        let page = self
            .current_page()
            .await
            .map_err(|e| self.fail(BrowserError::action("scroll", e)))?;

        // The session receives the mechanical opposite of the logical
        // direction.
        let gesture = logical.inverted();
        let (delta_x, delta_y) = gesture.wheel_delta(SCROLL_STEP_PX);
        let at = *self.cursor.read().await;
        page.scroll_gesture(at.x, at.y, delta_x, delta_y)
            .await
            .map_err(|e| {
                self.fail(BrowserError::action_with_context(
                    "scroll",
                    e,
                    json!({ "direction": direction }),
                ))
            })?;

        Ok(ActionResult::message(format!("Scrolled {logical}.")))
    }

    async fn screenshot(&self) -> Result<ActionResult> {
        self.ensure_alive()?;
        let page = self
            .current_page()
            .await
            .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?;

        let raw = page
            .screenshot()
            .await
            .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?;

        let bytes = if self.normalize_screenshots {
            let bucket = self.pipeline.select_bucket(self.viewport);
            self.pipeline
                .resize_to_bucket(&raw, bucket)
                .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?
        } else {
            raw
        };

        let path = save_screenshot(&self.working_dir, &bytes)
            .await
            .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?;
        info!("[WebBrowser] Screenshot saved to {}", path.display());

        let state = self
            .probe_state()
            .await
            .map_err(|e| self.fail(BrowserError::action("take screenshot", e)))?;

        Ok(ActionResult::message("Screenshot taken")
            .with_payload(ActionPayload::Screenshot {
                base64_image: BASE64.encode(&bytes),
            })
            .with_metadata(ActionMetadata::with_state(state)))
    }

    async fn locate_at(&self, x: f64, y: f64) -> Result<ActionResult> {
        self.ensure_alive()?;
        let page = self.current_page().await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "locate element",
                e,
                json!({ "x": x, "y": y }),
            ))
        })?;

        let script = format!("{LOCATE_COMPONENT_JS}({x}, {y})");
        let value = page.evaluate(&script).await.map_err(|e| {
            self.fail(BrowserError::action_with_context(
                "locate element",
                e,
                json!({ "x": x, "y": y }),
            ))
        })?;
        let element = value.as_str().unwrap_or_default().to_string();

        Ok(ActionResult::message("Found element located at coordinates.")
            .with_payload(ActionPayload::Element { element })
            .with_metadata(ActionMetadata::at(x, y)))
    }

    async fn sleep(&self, duration_ms: Option<u64>) -> Result<ActionResult> {
        self.ensure_alive()?;
        Ok(bounded_sleep("WebBrowser", duration_ms).await)
    }

    async fn get_state(&self) -> Result<ActionResult> {
        self.ensure_alive()?;
        let state = self
            .probe_state()
            .await
            .map_err(|e| self.fail(BrowserError::action("retrieve state", e)))?;
        Ok(ActionResult::message("State retrieved.").with_payload(ActionPayload::State { state }))
    }

    async fn cleanup(&self) -> Result<ActionResult> {
        self.ensure_alive()?;
        let pages: Vec<Arc<CdpPage>> = self.pages.read().await.clone();

        let wrap = |e: BrowserError| self.fail(BrowserError::action("clean up", e));

        if let Some(page) = pages.first() {
            page.clear_cookies()
                .await
                .map_err(|e| wrap(BrowserError::Cdp(e)))?;
        }
        for page in &pages {
            page.clear_origin_storage()
                .await
                .map_err(|e| wrap(BrowserError::Cdp(e)))?;
        }
        self.client
            .send_request(
                "Browser.resetPermissions",
                Some(json!({ "browserContextId": self.browser_context_id })),
                None,
            )
            .await
            .map_err(|e| wrap(BrowserError::Cdp(e)))?;

        for page in &pages {
            page.navigate_blank()
                .await
                .map_err(|e| wrap(BrowserError::Cdp(e)))?;
        }

        // Keep the oldest page; close the rest.
        if pages.len() > 1 {
            for page in &pages[1..] {
                page.close().await.map_err(|e| wrap(BrowserError::Cdp(e)))?;
            }
            self.pages.write().await.truncate(1);
        }

        info!("[WebBrowser] Browser state cleared");
        Ok(ActionResult::message("Cleaned up current browser state."))
    }

    async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Err(BrowserError::SessionNotInitialized);
        }

        for handle in self.init_tasks.lock().await.drain(..) {
            handle.abort();
        }

        let pages: Vec<Arc<CdpPage>> = self.pages.write().await.drain(..).collect();
        for page in pages {
            if let Err(e) = page.close().await {
                warn!("[WebBrowser] Failed to close page on destroy: {}", e);
            }
        }

        self.client
            .send_request(
                "Target.disposeBrowserContext",
                Some(json!({ "browserContextId": self.browser_context_id })),
                None,
            )
            .await?;

        info!("[WebBrowser] Browser {} destroyed", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_url_parsing() {
        assert_eq!(
            parse_url_lenient("https://example.com/a").unwrap().as_str(),
            "https://example.com/a"
        );
        assert_eq!(
            parse_url_lenient("http://example.com").unwrap().as_str(),
            "http://example.com/"
        );
        assert_eq!(
            parse_url_lenient("example.com").unwrap().as_str(),
            "https://example.com/"
        );
        // A bare host with port parses as a scheme; it gets upgraded too.
        assert_eq!(
            parse_url_lenient("localhost:3000").unwrap().as_str(),
            "https://localhost:3000/"
        );
        assert_eq!(
            parse_url_lenient("about:blank").unwrap().as_str(),
            "about:blank"
        );
    }

    #[test]
    fn test_locate_script_keeps_identifying_attributes_only() {
        for attr in ["placeholder", "aria-label", "role", "alt", r#""d","#] {
            assert!(LOCATE_COMPONENT_JS.contains(attr));
        }
        assert!(LOCATE_COMPONENT_JS.contains("elementFromPoint"));
        assert!(LOCATE_COMPONENT_JS.contains(r#"replace(/\s+/g, " ")"#));
    }

    // The live tests need Chrome running with --remote-debugging-port=9222.

    #[tokio::test]
    #[ignore]
    async fn test_navigate_click_and_screenshot_cycle() {
        let client = CdpClient::connect("ws://localhost:9222/devtools/browser")
            .await
            .unwrap();
        let workdir = tempfile::tempdir().unwrap();
        let browser = WebBrowser::create(
            client,
            DeviceViewport::new(1280, 720),
            workdir.path().to_path_buf(),
            true,
        )
        .await
        .unwrap();

        let nav = browser
            .navigate("https://example.com", NavigateOptions::default())
            .await
            .unwrap();
        assert_eq!(nav.message, "Navigation successful.");

        let clicked = browser.click(Some(100.0), Some(100.0)).await.unwrap();
        assert_eq!(clicked.message, "Mouse clicked at (100, 100)");

        let shot = browser.screenshot().await.unwrap();
        assert!(matches!(
            shot.payload,
            Some(ActionPayload::Screenshot { .. })
        ));

        browser.destroy().await.unwrap();
        assert!(browser.get_state().await.is_err());
    }
}
