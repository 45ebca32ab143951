//! Visual cursor overlay
//!
//! A small in-page marker that mirrors where the session last moved the
//! pointer, so screenshots show the cursor the way a recording would.
//! Installation is retried briefly and re-run after every page load;
//! failures degrade to a warning because actions work without it.

use crate::cdp::client::Result as CdpResult;
use crate::cdp::{CdpError, CdpPage};
use crate::events::PageEvent;
use crate::retry::retry_with_delay;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

const INSTALL_ATTEMPTS: usize = 3;
const INSTALL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Idempotent overlay install. Evaluates to `true` once the overlay API
/// is available on `window`.
const CURSOR_OVERLAY_JS: &str = r#"
(() => {
  if (window.__shortestCursor) return true;
  const cursor = document.createElement("div");
  cursor.id = "__shortest-cursor";
  cursor.style.cssText = [
    "position: fixed",
    "left: 0",
    "top: 0",
    "width: 12px",
    "height: 12px",
    "border-radius: 50%",
    "background: rgba(255, 64, 64, 0.85)",
    "border: 2px solid white",
    "transform: translate(-50%, -50%)",
    "pointer-events: none",
    "z-index: 2147483647",
  ].join("; ");
  const state = { x: 0, y: 0 };
  const move = (x, y) => {
    state.x = x;
    state.y = y;
    cursor.style.left = `${x}px`;
    cursor.style.top = `${y}px`;
  };
  const attach = () => {
    if (document.body && !document.getElementById("__shortest-cursor")) {
      document.body.appendChild(cursor);
    }
  };
  if (document.body) {
    attach();
  } else {
    document.addEventListener("DOMContentLoaded", attach);
  }
  window.__shortestCursor = { move, position: () => [state.x, state.y] };
  return true;
})()
"#;

/// Install the overlay into the page's current document.
pub async fn install_cursor(page: &CdpPage) -> CdpResult<()> {
    let value = page.evaluate(CURSOR_OVERLAY_JS).await?;
    if value == Value::Bool(true) {
        Ok(())
    } else {
        Err(CdpError::Protocol {
            code: -1,
            message: "Cursor overlay script did not confirm installation".into(),
        })
    }
}

/// Install with a short retry window. A page that never accepts the
/// overlay still works, so the final failure is only logged.
pub async fn initialize_cursor(page: &CdpPage) {
    let result = retry_with_delay(INSTALL_ATTEMPTS, INSTALL_RETRY_DELAY, || {
        install_cursor(page)
    })
    .await;
    if let Err(e) = result {
        warn!("[Cursor] Failed to install cursor overlay: {}", e);
    }
}

/// Keep the overlay alive across navigations: each load event wipes the
/// document, so re-run the install after every one. The returned handle
/// is aborted when the owning browser is destroyed.
pub fn spawn_reinstall_task(page: Arc<CdpPage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = page.subscribe();
        loop {
            match events.recv().await {
                Ok(PageEvent::LoadFired) => {
                    if let Err(e) = install_cursor(&page).await {
                        warn!(
                            "[Cursor] Failed to reinstall cursor overlay after load: {}",
                            e
                        );
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Move the overlay marker. Best effort: a missing overlay is not an
/// action failure.
pub async fn move_overlay(page: &CdpPage, x: f64, y: f64) {
    let script = format!(
        "window.__shortestCursor ? (window.__shortestCursor.move({x}, {y}), true) : false"
    );
    if let Err(e) = page.evaluate(&script).await {
        warn!("[Cursor] Failed to move cursor overlay: {}", e);
    }
}

/// Position the overlay last rendered at, if it is installed.
pub async fn cursor_position(page: &CdpPage) -> Option<(f64, f64)> {
    let value = page
        .evaluate("window.__shortestCursor ? window.__shortestCursor.position() : null")
        .await
        .ok()?;
    let pair = value.as_array()?;
    match (pair.first()?.as_f64(), pair.get(1)?.as_f64()) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_script_is_idempotent_and_unclickable() {
        assert!(CURSOR_OVERLAY_JS.contains("if (window.__shortestCursor) return true;"));
        assert!(CURSOR_OVERLAY_JS.contains("pointer-events: none"));
        assert!(CURSOR_OVERLAY_JS.contains("2147483647"));
    }

    #[test]
    fn test_move_script_interpolates_plain_numbers() {
        let script = format!(
            "window.__shortestCursor ? (window.__shortestCursor.move({x}, {y}), true) : false",
            x = 410.0,
            y = 700.5
        );
        assert!(script.contains("move(410, 700.5)"));
    }
}
