//! CDP (Chrome DevTools Protocol) transport
//!
//! Core principle: Single WebSocket connection, multiplexed sessions.
//! No locks in hot path - use message passing instead.

pub mod client;
pub mod page;
pub mod protocol;

pub use client::{CdpClient, CdpError};
pub use page::CdpPage;
pub use protocol::{CdpEvent, CdpRequest, CdpResponse, LayoutViewport, TargetId};
