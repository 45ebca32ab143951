//! Cross-platform browser action layer
//!
//! One [`Browser`](contract::Browser) trait, three platform variants:
//! web over CDP (Chrome DevTools Protocol), Android and iOS over a W3C
//! automation server. Every action resolves to the same
//! [`ActionResult`](action::ActionResult) shape, including explicit
//! "unsupported on this platform" results, so callers never branch on
//! the platform.
//!
//! Supporting pieces live alongside the variants: the page event bus and
//! stability detector (wait for load, then for a mutation-quiet window),
//! the cursor overlay, bounded retry, and screenshot persistence.

pub mod action;
pub mod android;
pub mod cdp;
pub mod contract;
pub mod cursor;
pub mod error;
pub mod events;
pub mod ios;
pub mod mobile;
pub mod retry;
pub mod screenshots;
pub mod stability;
pub mod web;

pub use action::{
    ActionMetadata, ActionPayload, ActionResult, BrowserState, CursorPosition, CursorState,
    NavigateOptions, Platform, ScrollDirection, WindowState,
};
pub use android::AndroidBrowser;
pub use cdp::{CdpClient, CdpError, CdpPage};
pub use contract::Browser;
pub use error::{BrowserError, Result};
pub use events::{PageEvent, PageEventBus};
pub use ios::IosBrowser;
pub use mobile::MobileSession;
pub use retry::{retry, retry_with_delay};
pub use stability::{StabilityConfig, StabilityDetector};
pub use web::WebBrowser;
