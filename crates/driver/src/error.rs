//! Error types for driver construction and session lifecycle management.

use thiserror::Error;

use crate::contract::DriverState;

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Connecting to the automation backend failed on every attempt.
    #[error("Driver initialization failed after {attempts} attempts")]
    InitializationFailed {
        attempts: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Browser session with ID {id} not found.")]
    SessionNotFound { id: String },

    #[error("Device information not available. Ensure that init() is called first.")]
    DeviceInfoUnavailable,

    /// The driver is not in a state that allows the requested operation.
    #[error("Driver is not ready (current state: {state})")]
    NotReady { state: DriverState },

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("CDP error: {0}")]
    Cdp(#[from] browser::CdpError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
