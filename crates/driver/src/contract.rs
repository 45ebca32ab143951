//! The driver contract shared by all platforms.
//!
//! A [`Driver`] owns exactly one connection to an automation backend (a CDP
//! websocket for web, an Appium session for mobile) and hands out
//! [`Browser`] instances bound to it. Browsers are tracked in the driver's
//! registry until [`Driver::close_browser`] or [`Driver::destroy`] releases
//! them.
//!
//! Lifecycle is a one-way street: `Uninitialized` → `Initializing` → `Ready`
//! → `Destroyed`. A failed `init` falls back to `Uninitialized` so it can be
//! retried; nothing is valid after `Destroyed`.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use browser::{Browser, Platform};
use vision::DeviceViewport;

use crate::error::{DriverError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Uninitialized => "uninitialized",
            DriverState::Initializing => "initializing",
            DriverState::Ready => "ready",
            DriverState::Destroyed => "destroyed",
        };
        write!(f, "{name}")
    }
}

/// Lifecycle flag shared between the driver and its browsers.
pub(crate) struct StateCell(RwLock<DriverState>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(RwLock::new(DriverState::Uninitialized))
    }

    pub(crate) fn get(&self) -> DriverState {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, state: DriverState) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub(crate) fn require_ready(&self) -> Result<()> {
        match self.get() {
            DriverState::Ready => Ok(()),
            state => Err(DriverError::NotReady { state }),
        }
    }
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn platform(&self) -> Platform;

    fn state(&self) -> DriverState;

    /// Connect to the automation backend. Web drivers defer the actual
    /// connection to the first browser; mobile drivers connect here with
    /// bounded retry and record the device viewport.
    async fn init(&self) -> Result<()>;

    /// Create a browser bound to this driver's session and register it
    /// under a fresh id.
    async fn create_browser(&self) -> Result<Arc<dyn Browser>>;

    /// Destroy the browser registered under `id` and drop it from the
    /// registry. The registry entry survives a failed destroy so the call
    /// can be retried.
    async fn close_browser(&self, id: &str) -> Result<()>;

    /// Viewport of the connected device, captured during `init`. Only
    /// mobile drivers have one.
    fn device_info(&self) -> Result<DeviceViewport>;

    /// Tear down every registered browser and release the backend
    /// connection.
    async fn destroy(&self) -> Result<()>;
}

impl fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("platform", &self.platform())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(DriverState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(DriverState::Ready.to_string(), "ready");
    }

    #[test]
    fn test_state_cell_requires_ready() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), DriverState::Uninitialized);
        assert!(matches!(
            cell.require_ready(),
            Err(DriverError::NotReady {
                state: DriverState::Uninitialized
            })
        ));

        cell.set(DriverState::Ready);
        assert!(cell.require_ready().is_ok());

        cell.set(DriverState::Destroyed);
        assert!(matches!(
            cell.require_ready(),
            Err(DriverError::NotReady {
                state: DriverState::Destroyed
            })
        ));
    }
}
