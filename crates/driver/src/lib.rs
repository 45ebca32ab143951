//! Platform driver layer
//!
//! A [`Driver`](contract::Driver) owns one connection to an automation
//! backend and the registry of browsers created over it. The
//! [`create_driver`](factory::create_driver) factory is the only place
//! that branches on the platform: it builds, initializes, and hands back
//! an `Arc<dyn Driver>`, after which callers work purely through the
//! driver and browser contracts.
//!
//! Web drivers connect lazily over CDP; mobile drivers connect eagerly
//! to an Appium server during `init`, with bounded retry, and record the
//! device viewport for later `device_info` calls.

pub mod android;
pub mod config;
pub mod contract;
pub mod error;
pub mod factory;
pub mod ios;
pub mod registry;
pub mod web;

pub use android::AndroidDriver;
pub use config::{DriverConfig, DEFAULT_AUTOMATION_SERVER_URL, DEFAULT_CDP_URL};
pub use contract::{Driver, DriverState};
pub use error::{DriverError, Result};
pub use factory::create_driver;
pub use ios::IosDriver;
pub use registry::BrowserRegistry;
pub use web::WebDriver;
