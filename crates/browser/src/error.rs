//! Error types for browser actions and session plumbing
//!
//! One flat enum per crate. Transport failures (CDP, HTTP) convert in via
//! `#[from]`; action failures wrap their cause together with the inputs
//! that produced it, so the caller always sees an annotated error, never
//! a bare transport message.

use crate::cdp::CdpError;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Session not initialized")]
    SessionNotInitialized,

    #[error("No page found")]
    NoActivePage,

    #[error("Failed to {action}")]
    ActionFailed {
        action: &'static str,
        /// Inputs that produced the failure (coordinates, text, keys).
        context: Option<Value>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Timed out after {timeout_ms}ms waiting for the DOM to stabilize")]
    StabilityTimeout { timeout_ms: u64 },

    #[error("Unrecognized scroll direction: {0}")]
    UnknownScrollDirection(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),

    #[error("Automation server error: {0}")]
    AutomationServer(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image pipeline error: {0}")]
    Vision(#[from] vision::VisionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BrowserError {
    /// Wrap `source` as an action failure, keeping the inputs that
    /// produced it for the log line and the caller.
    pub fn action(
        action: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ActionFailed {
            action,
            context: None,
            source: source.into(),
        }
    }

    pub fn action_with_context(
        action: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
        context: Value,
    ) -> Self {
        Self::ActionFailed {
            action,
            context: Some(context),
            source: source.into(),
        }
    }

    /// Render the full cause chain, outermost first. Used when logging a
    /// failure before propagating it.
    pub fn cause_chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}
