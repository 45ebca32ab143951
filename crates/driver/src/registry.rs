//! Browser session registry.

use std::sync::Arc;

use browser::Browser;
use dashmap::DashMap;

use crate::error::{DriverError, Result};

/// Sessions owned by a single driver, keyed by browser id.
///
/// Each driver carries its own registry rather than sharing module-level
/// state, so independent drivers (including ones running in parallel test
/// suites) never see each other's browsers.
#[derive(Default)]
pub struct BrowserRegistry {
    sessions: DashMap<String, Arc<dyn Browser>>,
}

impl BrowserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, browser: Arc<dyn Browser>) {
        self.sessions.insert(browser.id().to_string(), browser);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Browser>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the entry for `id`. Fails without touching the registry when
    /// the id is unknown.
    pub fn remove(&self, id: &str) -> Result<Arc<dyn Browser>> {
        self.sessions
            .remove(id)
            .map(|(_, browser)| browser)
            .ok_or_else(|| DriverError::SessionNotFound { id: id.to_string() })
    }

    /// Destroy the browser registered under `id`, then drop its entry.
    /// The entry survives a failed destroy so the close can be retried.
    pub async fn close(&self, id: &str) -> Result<Arc<dyn Browser>> {
        let browser = self
            .get(id)
            .ok_or_else(|| DriverError::SessionNotFound { id: id.to_string() })?;
        browser.destroy().await?;
        self.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove and return every session, leaving the registry empty.
    pub fn drain(&self) -> Vec<Arc<dyn Browser>> {
        self.ids()
            .iter()
            .filter_map(|id| self.sessions.remove(id).map(|(_, browser)| browser))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser::{AndroidBrowser, MobileSession};
    use url::Url;
    use vision::DeviceViewport;

    fn offline_browser() -> Arc<AndroidBrowser> {
        let session = Arc::new(MobileSession::new(
            Url::parse("http://localhost:4723").unwrap(),
        ));
        AndroidBrowser::new(session, DeviceViewport::new(1080, 2400), std::env::temp_dir())
    }

    #[test]
    fn test_registered_browsers_have_distinct_ids() {
        let registry = BrowserRegistry::new();
        let first = offline_browser();
        let second = offline_browser();
        registry.insert(first.clone());
        registry.insert(second.clone());

        assert_eq!(registry.len(), 2);
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.get(first.id()).unwrap().id(), first.id());
    }

    #[test]
    fn test_remove_unknown_id_leaves_registry_unchanged() {
        let registry = BrowserRegistry::new();
        registry.insert(offline_browser());

        let result = registry.remove("nonexistent");
        assert!(matches!(
            result,
            Err(DriverError::SessionNotFound { id }) if id == "nonexistent"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_returns_the_browser() {
        let registry = BrowserRegistry::new();
        let browser = offline_browser();
        let id = browser.id().to_string();
        registry.insert(browser);

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_close_keeps_entry_when_destroy_fails() {
        let registry = BrowserRegistry::new();
        // No device session behind it, so destroy cannot complete.
        let browser = offline_browser();
        let id = browser.id().to_string();
        registry.insert(browser);

        assert!(registry.close(&id).await.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_drain_empties_the_registry() {
        let registry = BrowserRegistry::new();
        registry.insert(offline_browser());
        registry.insert(offline_browser());

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }
}
