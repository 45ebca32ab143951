//! Page event bus - lifecycle and mutation signals from a live page
//!
//! Design: Type-safe events with async consumers.
//! No dynamic dispatch overhead - use enums, not trait objects.

use tokio::sync::broadcast;

/// Signals a page emits while loading and mutating. The stability
/// detector consumes these; publishing never blocks the session reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// DOMContentLoaded fired on the current document.
    ContentLoaded,
    /// The window load event fired.
    LoadFired,
    /// The injected observer reported a DOM mutation.
    MutationObserved,
}

/// Simple event bus using tokio broadcast channel
pub struct PageEventBus {
    tx: broadcast::Sender<PageEvent>,
}

impl PageEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: PageEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }
}

impl Default for PageEventBus {
    fn default() -> Self {
        Self::new()
    }
}
