//! CDP Page - a session attached to one page target
//!
//! Design: Lightweight wrapper around CdpClient with target-specific context.
//! All pages share the same WebSocket - no per-page connection overhead.
//!
//! On attach the page installs a mutation-reporting binding and wires the
//! target's lifecycle events into a [`PageEventBus`], which is what the
//! stability detector listens to.

use super::client::{CdpClient, CdpError, Result};
use super::protocol::{AttachToTargetResult, LayoutViewport, SessionId, TargetId, TargetInfo};
use crate::events::{PageEvent, PageEventBus};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Binding name the in-page observer calls on every DOM mutation batch.
pub const MUTATION_BINDING: &str = "__shortestMutation";

/// Installed on every new document; reports mutations through the binding.
/// Observing `document` works before `<body>` exists.
const MUTATION_BOOTSTRAP_JS: &str = r#"
(() => {
  if (window.__shortestMutationInstalled) return;
  window.__shortestMutationInstalled = true;
  const report = () => {
    if (typeof window.__shortestMutation === "function") {
      window.__shortestMutation("mutation");
    }
  };
  new MutationObserver(report).observe(document, {
    childList: true,
    subtree: true,
    attributes: true,
    characterData: true,
  });
})();
"#;

struct KeySpec {
    key: &'static str,
    code: &'static str,
    virtual_key: i32,
    /// Bit this key contributes to the CDP modifier mask while held.
    modifier_bit: i32,
}

/// Maps friendly key names to CDP key identifiers. Unlisted single
/// characters are dispatched as text-producing keys.
fn resolve_key(name: &str) -> Option<KeySpec> {
    let spec = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => KeySpec { key: "Enter", code: "Enter", virtual_key: 13, modifier_bit: 0 },
        "tab" => KeySpec { key: "Tab", code: "Tab", virtual_key: 9, modifier_bit: 0 },
        "escape" | "esc" => KeySpec { key: "Escape", code: "Escape", virtual_key: 27, modifier_bit: 0 },
        "backspace" => KeySpec { key: "Backspace", code: "Backspace", virtual_key: 8, modifier_bit: 0 },
        "delete" => KeySpec { key: "Delete", code: "Delete", virtual_key: 46, modifier_bit: 0 },
        "space" => KeySpec { key: " ", code: "Space", virtual_key: 32, modifier_bit: 0 },
        "home" => KeySpec { key: "Home", code: "Home", virtual_key: 36, modifier_bit: 0 },
        "end" => KeySpec { key: "End", code: "End", virtual_key: 35, modifier_bit: 0 },
        "pageup" => KeySpec { key: "PageUp", code: "PageUp", virtual_key: 33, modifier_bit: 0 },
        "pagedown" => KeySpec { key: "PageDown", code: "PageDown", virtual_key: 34, modifier_bit: 0 },
        "arrowup" | "up" => KeySpec { key: "ArrowUp", code: "ArrowUp", virtual_key: 38, modifier_bit: 0 },
        "arrowdown" | "down" => KeySpec { key: "ArrowDown", code: "ArrowDown", virtual_key: 40, modifier_bit: 0 },
        "arrowleft" | "left" => KeySpec { key: "ArrowLeft", code: "ArrowLeft", virtual_key: 37, modifier_bit: 0 },
        "arrowright" | "right" => KeySpec { key: "ArrowRight", code: "ArrowRight", virtual_key: 39, modifier_bit: 0 },
        "control" | "ctrl" => KeySpec { key: "Control", code: "ControlLeft", virtual_key: 17, modifier_bit: 2 },
        "shift" => KeySpec { key: "Shift", code: "ShiftLeft", virtual_key: 16, modifier_bit: 8 },
        "alt" => KeySpec { key: "Alt", code: "AltLeft", virtual_key: 18, modifier_bit: 1 },
        "meta" | "cmd" | "command" => KeySpec { key: "Meta", code: "MetaLeft", virtual_key: 91, modifier_bit: 4 },
        _ => return None,
    };
    Some(spec)
}

/// CDP session bound to one page target
pub struct CdpPage {
    /// Shared CDP client
    client: Arc<CdpClient>,

    /// Target this page is attached to
    pub target_id: TargetId,

    /// Session ID assigned by Chrome
    pub session_id: SessionId,

    /// Lifecycle and mutation signals for this page only
    events: Arc<PageEventBus>,
}

impl CdpPage {
    /// Attach to a page target, enable the domains actions need, and wire
    /// lifecycle events into the page bus.
    pub async fn attach(client: Arc<CdpClient>, target_id: TargetId) -> Result<Arc<Self>> {
        let result = client
            .send_request(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true,
                })),
                None,
            )
            .await?;

        let attach_result: AttachToTargetResult = serde_json::from_value(result)?;
        let session_id = attach_result.session_id;

        // Enable all domains in parallel
        let enable_futures: Vec<_> = ["Page", "Runtime", "Network"]
            .into_iter()
            .map(|domain| {
                let client = client.clone();
                let session_id = session_id.clone();
                async move {
                    client
                        .send_request(format!("{domain}.enable"), None, Some(session_id))
                        .await
                }
            })
            .collect();

        // Wait for all enables (ignore individual failures)
        let results = futures_util::future::join_all(enable_futures).await;
        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            tracing::warn!(
                "[CdpPage] Some domain enables failed: {}/{}",
                failures,
                results.len()
            );
        }

        client
            .send_request(
                "Runtime.addBinding",
                Some(json!({ "name": MUTATION_BINDING })),
                Some(session_id.clone()),
            )
            .await?;

        client
            .send_request(
                "Page.addScriptToEvaluateOnNewDocument",
                Some(json!({ "source": MUTATION_BOOTSTRAP_JS })),
                Some(session_id.clone()),
            )
            .await?;

        let events = Arc::new(PageEventBus::new());

        {
            let bus = events.clone();
            let own_session = session_id.clone();
            client.subscribe(
                "Page.domContentEventFired",
                Arc::new(move |event| {
                    if event.session_id.as_deref() == Some(own_session.as_str()) {
                        bus.publish(PageEvent::ContentLoaded);
                    }
                }),
            );
        }
        {
            let bus = events.clone();
            let own_session = session_id.clone();
            client.subscribe(
                "Page.loadEventFired",
                Arc::new(move |event| {
                    if event.session_id.as_deref() == Some(own_session.as_str()) {
                        bus.publish(PageEvent::LoadFired);
                    }
                }),
            );
        }
        {
            let bus = events.clone();
            let own_session = session_id.clone();
            client.subscribe(
                "Runtime.bindingCalled",
                Arc::new(move |event| {
                    if event.session_id.as_deref() != Some(own_session.as_str()) {
                        return;
                    }
                    let name = event
                        .params
                        .as_ref()
                        .and_then(|p| p.get("name"))
                        .and_then(Value::as_str);
                    if name == Some(MUTATION_BINDING) {
                        bus.publish(PageEvent::MutationObserved);
                    }
                }),
            );
        }

        let page = Arc::new(Self {
            client,
            target_id,
            session_id,
            events,
        });

        // The on-new-document script only covers future documents; cover
        // the one already loaded too. Best effort.
        if let Err(e) = page.evaluate(MUTATION_BOOTSTRAP_JS).await {
            tracing::warn!(
                "[CdpPage] Failed to install mutation observer on current document: {}",
                e
            );
        }

        Ok(page)
    }

    /// Send command within this page's session context
    pub async fn send(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.client
            .send_request(method, params, Some(self.session_id.clone()))
            .await
    }

    /// Lifecycle and mutation signals for this page.
    pub fn events(&self) -> &PageEventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// Current target info (url, title)
    pub async fn target_info(&self) -> Result<TargetInfo> {
        let result = self
            .client
            .send_request(
                "Target.getTargetInfo",
                Some(json!({ "targetId": &self.target_id })),
                None,
            )
            .await?;
        let info = result
            .get("targetInfo")
            .cloned()
            .ok_or_else(|| CdpError::Protocol {
                code: -1,
                message: "Target.getTargetInfo returned no targetInfo".into(),
            })?;
        Ok(serde_json::from_value(info)?)
    }

    /// Navigate and wait for the window load event, bounded by `timeout`.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        // Subscribe before navigating so a fast load is not missed.
        let mut load_events = self.subscribe();

        let navigation = async {
            let result = self
                .send("Page.navigate", Some(json!({ "url": url })))
                .await?;
            if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
                if !error_text.is_empty() {
                    return Err(CdpError::Protocol {
                        code: -1,
                        message: format!("Navigation failed: {error_text}"),
                    });
                }
            }

            loop {
                match load_events.recv().await {
                    Ok(PageEvent::LoadFired) => return Ok(()),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return Err(CdpError::Closed),
                }
            }
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| CdpError::Timeout)?
    }

    /// Point the page at about:blank without waiting for load.
    pub async fn navigate_blank(&self) -> Result<()> {
        self.send("Page.navigate", Some(json!({ "url": "about:blank" })))
            .await?;
        Ok(())
    }

    /// Evaluate JavaScript in the page, returning the completion value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("JavaScript evaluation failed");
            return Err(CdpError::Protocol {
                code: -1,
                message: message.to_string(),
            });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Capture the current frame as PNG bytes.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let result = self
            .send("Page.captureScreenshot", Some(json!({ "format": "png" })))
            .await?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| CdpError::Protocol {
                code: -1,
                message: "Page.captureScreenshot returned no data".into(),
            })?;
        BASE64.decode(data).map_err(|e| CdpError::Protocol {
            code: -1,
            message: format!("Invalid screenshot payload: {e}"),
        })
    }

    /// Override the page's viewport dimensions.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.send(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        Ok(())
    }

    /// CSS layout viewport as currently rendered.
    pub async fn layout_viewport(&self) -> Result<LayoutViewport> {
        let result = self.send("Page.getLayoutMetrics", None).await?;
        let viewport = result
            .get("cssLayoutViewport")
            .or_else(|| result.get("layoutViewport"))
            .cloned()
            .ok_or_else(|| CdpError::Protocol {
                code: -1,
                message: "Page.getLayoutMetrics returned no viewport".into(),
            })?;
        Ok(serde_json::from_value(viewport)?)
    }

    pub async fn dispatch_mouse_move(&self, x: f64, y: f64) -> Result<()> {
        self.send(
            "Input.dispatchMouseEvent",
            Some(json!({ "type": "mouseMoved", "x": x, "y": y })),
        )
        .await?;
        Ok(())
    }

    pub async fn mouse_down(&self, x: f64, y: f64) -> Result<()> {
        self.send(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": "mousePressed",
                "x": x,
                "y": y,
                "button": "left",
                "clickCount": 1,
            })),
        )
        .await?;
        Ok(())
    }

    pub async fn mouse_up(&self, x: f64, y: f64) -> Result<()> {
        self.send(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": "mouseReleased",
                "x": x,
                "y": y,
                "button": "left",
                "clickCount": 1,
            })),
        )
        .await?;
        Ok(())
    }

    /// Left click: press and release at the same point.
    pub async fn dispatch_click(&self, x: f64, y: f64) -> Result<()> {
        self.mouse_down(x, y).await?;
        self.mouse_up(x, y).await
    }

    /// Wheel scroll at the given point.
    pub async fn scroll_gesture(&self, x: f64, y: f64, delta_x: f64, delta_y: f64) -> Result<()> {
        self.send(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": "mouseWheel",
                "x": x,
                "y": y,
                "deltaX": delta_x,
                "deltaY": delta_y,
            })),
        )
        .await?;
        Ok(())
    }

    /// Insert text as if typed, without synthesizing per-character keys.
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.send("Input.insertText", Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    /// Dispatch a key-down for `name` under the given modifier mask,
    /// returning the modifier bit this key contributes while held.
    pub async fn key_down(&self, name: &str, modifiers: i32) -> Result<i32> {
        let (params, bit) = self.key_event_params("keyDown", name, modifiers);
        self.send("Input.dispatchKeyEvent", Some(params)).await?;
        Ok(bit)
    }

    pub async fn key_up(&self, name: &str, modifiers: i32) -> Result<()> {
        let (params, _) = self.key_event_params("keyUp", name, modifiers);
        self.send("Input.dispatchKeyEvent", Some(params)).await?;
        Ok(())
    }

    /// Full key press: down then up, no modifiers held.
    pub async fn press_key(&self, name: &str) -> Result<()> {
        self.key_down(name, 0).await?;
        self.key_up(name, 0).await
    }

    fn key_event_params(&self, event_type: &str, name: &str, modifiers: i32) -> (Value, i32) {
        if let Some(spec) = resolve_key(name) {
            let mut params = json!({
                "type": event_type,
                "key": spec.key,
                "code": spec.code,
                "windowsVirtualKeyCode": spec.virtual_key,
                "nativeVirtualKeyCode": spec.virtual_key,
                "modifiers": modifiers,
            });
            // Space produces text on the way down.
            if event_type == "keyDown" && spec.key == " " {
                params["text"] = json!(" ");
            }
            return (params, spec.modifier_bit);
        }

        // Single printable character: dispatch as a text-producing key.
        let text = if event_type == "keyDown" && name.chars().count() == 1 {
            Some(name.to_string())
        } else {
            None
        };
        let mut params = json!({
            "type": event_type,
            "key": name,
            "modifiers": modifiers,
        });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        (params, 0)
    }

    /// Drop all cookies held by the browser.
    pub async fn clear_cookies(&self) -> Result<()> {
        self.send("Network.clearBrowserCookies", None).await?;
        Ok(())
    }

    /// Clear this page's origin storage: local/session storage and any
    /// IndexedDB databases the origin owns.
    pub async fn clear_origin_storage(&self) -> Result<()> {
        self.evaluate(
            r#"
(async () => {
  try { localStorage.clear(); } catch (e) {}
  try { sessionStorage.clear(); } catch (e) {}
  try {
    if (window.indexedDB && indexedDB.databases) {
      const dbs = await indexedDB.databases();
      for (const db of dbs) {
        if (db.name) indexedDB.deleteDatabase(db.name);
      }
    }
  } catch (e) {}
  return true;
})()
"#,
        )
        .await?;
        Ok(())
    }

    /// Close the underlying target. The page is unusable afterwards.
    pub async fn close(&self) -> Result<()> {
        self.client
            .send_request(
                "Target.closeTarget",
                Some(json!({ "targetId": &self.target_id })),
                None,
            )
            .await?;
        Ok(())
    }
}
