//! Driver configuration.
//!
//! One [`DriverConfig`] describes everything a driver needs to reach its
//! backend: the target platform, the endpoint for that platform's automation
//! server, and the viewport browsers should assume. Defaults match a local
//! development setup (Chrome with remote debugging on 9222, Appium on 4723).

use std::path::PathBuf;

use browser::Platform;
use serde::{Deserialize, Serialize};
use vision::DeviceViewport;

/// Default CDP endpoint exposed by `chromium --remote-debugging-port=9222`.
pub const DEFAULT_CDP_URL: &str = "ws://localhost:9222/devtools/browser";

/// Default Appium server endpoint.
pub const DEFAULT_AUTOMATION_SERVER_URL: &str = "http://localhost:4723";

const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverConfig {
    pub platform: Platform,
    /// WebSocket endpoint of the browser-level CDP target. Web only.
    pub cdp_url: String,
    /// HTTP endpoint of the Appium server. Mobile only.
    pub automation_server_url: String,
    /// App to bring to the foreground once the mobile session is connected.
    /// Package name on Android, bundle identifier on iOS.
    pub app_id: Option<String>,
    /// Viewport applied to web pages. Mobile drivers replace this with the
    /// device's real dimensions during `init`.
    pub viewport: DeviceViewport,
    /// Directory under which screenshots are stored. Defaults to the
    /// process working directory.
    pub working_dir: Option<PathBuf>,
    /// Whether web screenshots are normalized to an aspect-ratio bucket
    /// before being handed to the model.
    pub normalize_screenshots: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Web,
            cdp_url: DEFAULT_CDP_URL.to_string(),
            automation_server_url: DEFAULT_AUTOMATION_SERVER_URL.to_string(),
            app_id: None,
            viewport: DeviceViewport::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT),
            working_dir: None,
            normalize_screenshots: true,
        }
    }
}

impl DriverConfig {
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    pub(crate) fn resolved_working_dir(&self) -> std::io::Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }
}
