//! Action contract types
//!
//! Every browser action resolves to an [`ActionResult`]: a human-readable
//! message, an optional typed payload, and optional metadata with a
//! best-effort browser-state snapshot. The serialized shape is part of
//! the orchestrator-facing contract, hence the camelCase renames.

use crate::error::BrowserError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vision::ImageDimension;

/// Wait applied when a requested sleep passes no duration.
pub const DEFAULT_SLEEP_DURATION_MS: u64 = 1000;

/// Upper bound on a single sleep action.
pub const MAX_SLEEP_DURATION_MS: u64 = 60_000;

/// Upper bound on one navigation, including the load wait.
pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Last pointer position a browser remembers. Only successful pointer
/// actions write it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CursorState {
    pub position: CursorPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageDimension>,
}

/// Last-known window and cursor state, refreshed opportunistically after
/// actions. Partial by design: a mobile session may only know its size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrowserState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    Screenshot {
        #[serde(rename = "base64Image")]
        base64_image: String,
    },
    Element {
        element: String,
    },
    State {
        state: BrowserState,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_state: Option<BrowserState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl ActionMetadata {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn with_state(state: BrowserState) -> Self {
        Self {
            browser_state: Some(state),
            ..Self::default()
        }
    }
}

/// Uniform return shape for every browser action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ActionPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionMetadata>,
}

impl ActionResult {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: None,
            metadata: None,
        }
    }

    pub fn with_payload(mut self, payload: ActionPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_metadata(mut self, metadata: ActionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Explicit "unsupported on this platform" outcome. Mobile variants
    /// answer with this instead of failing, keeping the action contract
    /// total across platforms.
    pub fn unsupported(action: &str, platform: Platform) -> Self {
        Self::message(format!("{action} is not supported on {platform}"))
    }
}

/// Logical scroll direction requested by the caller.
///
/// The gesture sent to the session moves the opposite way: scrolling
/// "down" drags the content upward. [`inverted`](Self::inverted) encodes
/// that flip; action code issues the inverted direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn inverted(self) -> Self {
        match self {
            ScrollDirection::Up => ScrollDirection::Down,
            ScrollDirection::Down => ScrollDirection::Up,
            ScrollDirection::Left => ScrollDirection::Right,
            ScrollDirection::Right => ScrollDirection::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }

    /// Wheel delta realizing this as a gesture, x then y. A gesture
    /// swipes the content: swiping up reveals what is below, which on a
    /// wheel is a positive deltaY.
    pub fn wheel_delta(self, magnitude: f64) -> (f64, f64) {
        match self {
            ScrollDirection::Up => (0.0, magnitude),
            ScrollDirection::Down => (0.0, -magnitude),
            ScrollDirection::Left => (magnitude, 0.0),
            ScrollDirection::Right => (-magnitude, 0.0),
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrollDirection {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            _ => Err(BrowserError::UnknownScrollDirection(s.to_string())),
        }
    }
}

/// Options accepted by `navigate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigateOptions {
    /// Run the page initialization routine (cursor overlay install plus
    /// re-install on later loads) after a successful navigation.
    pub should_initialize: bool,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            should_initialize: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_result_wire_shape() {
        let result = ActionResult::message("Screenshot taken")
            .with_payload(ActionPayload::Screenshot {
                base64_image: "aGk=".into(),
            })
            .with_metadata(ActionMetadata::with_state(BrowserState {
                window: Some(WindowState {
                    url: Some("https://example.com".into()),
                    title: None,
                    size: Some(ImageDimension::new(1920, 1080)),
                }),
                cursor: None,
            }));

        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(
            wire,
            json!({
                "message": "Screenshot taken",
                "payload": { "base64Image": "aGk=" },
                "metadata": {
                    "browserState": {
                        "window": {
                            "url": "https://example.com",
                            "size": { "width": 1920, "height": 1080 }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_bare_result_omits_empty_fields() {
        let wire = serde_json::to_value(ActionResult::message("Navigation successful.")).unwrap();
        assert_eq!(wire, json!({ "message": "Navigation successful." }));
    }

    #[test]
    fn test_unsupported_result_names_action_and_platform() {
        let result = ActionResult::unsupported("navigate", Platform::Android);
        assert_eq!(result.message, "navigate is not supported on android");
        assert!(result.payload.is_none());
    }

    #[test]
    fn test_scroll_direction_parses_case_insensitively() {
        assert_eq!("up".parse::<ScrollDirection>().unwrap(), ScrollDirection::Up);
        assert_eq!(
            "DOWN".parse::<ScrollDirection>().unwrap(),
            ScrollDirection::Down
        );
        assert_eq!(
            "Left".parse::<ScrollDirection>().unwrap(),
            ScrollDirection::Left
        );
        assert_eq!(
            "right".parse::<ScrollDirection>().unwrap(),
            ScrollDirection::Right
        );
    }

    #[test]
    fn test_unknown_scroll_direction_is_rejected() {
        let err = "sideways".parse::<ScrollDirection>().unwrap_err();
        assert!(matches!(err, BrowserError::UnknownScrollDirection(d) if d == "sideways"));
    }

    #[test]
    fn test_scroll_inversion_is_mechanical_opposite() {
        assert_eq!(ScrollDirection::Up.inverted(), ScrollDirection::Down);
        assert_eq!(ScrollDirection::Down.inverted(), ScrollDirection::Up);
        assert_eq!(ScrollDirection::Left.inverted(), ScrollDirection::Right);
        assert_eq!(ScrollDirection::Right.inverted(), ScrollDirection::Left);
        for direction in [
            ScrollDirection::Up,
            ScrollDirection::Down,
            ScrollDirection::Left,
            ScrollDirection::Right,
        ] {
            assert_eq!(direction.inverted().inverted(), direction);
        }
    }

    #[test]
    fn test_inverted_gesture_moves_content_the_logical_way() {
        // Scrolling logically down is issued as an upward gesture, which
        // lands as a positive deltaY on the wheel.
        let gesture = ScrollDirection::Down.inverted();
        assert_eq!(gesture.wheel_delta(400.0), (0.0, 400.0));

        let gesture = ScrollDirection::Right.inverted();
        assert_eq!(gesture.wheel_delta(400.0), (400.0, 0.0));
    }

    #[test]
    fn test_platform_round_trips_through_strings() {
        for platform in [Platform::Web, Platform::Android, Platform::Ios] {
            assert_eq!(
                platform.as_str().parse::<Platform>().unwrap(),
                platform
            );
        }
        assert!("desktop".parse::<Platform>().is_err());
    }

    #[test]
    fn test_navigate_options_default_initializes() {
        assert!(NavigateOptions::default().should_initialize);
        let parsed: NavigateOptions = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.should_initialize);
        let parsed: NavigateOptions =
            serde_json::from_value(json!({ "shouldInitialize": false })).unwrap();
        assert!(!parsed.should_initialize);
    }
}
