//! Open-tab registry and domain-matched broadcast.

use crate::messages::PageMessage;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

/// Unique identifier for an open tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(u64);

impl TabId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// An open tab: its current URL and the channel its page agent reads.
#[derive(Debug)]
pub struct Tab {
    pub id: TabId,
    pub url: Url,
    tx: mpsc::UnboundedSender<PageMessage>,
}

impl Tab {
    /// Hostname of the tab's URL, if it has one. Internal pages
    /// (about:blank and friends) have none and never match a broadcast.
    pub fn hostname(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Send one message to the tab's page agent.
    pub fn send(&self, message: PageMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Registry of every open tab.
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<TabId, Tab>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tab and hand back its id.
    pub fn register(&mut self, url: Url, tx: mpsc::UnboundedSender<PageMessage>) -> TabId {
        let id = TabId::new();
        debug!(tab = id.raw(), url = %url, "tab registered");
        self.tabs.insert(id, Tab { id, url, tx });
        id
    }

    /// Remove a tab (closed or discarded).
    pub fn unregister(&mut self, id: TabId) -> bool {
        let removed = self.tabs.remove(&id).is_some();
        if removed {
            debug!(tab = id.raw(), "tab unregistered");
        }
        removed
    }

    /// Record a navigation: the tab now shows a different URL.
    pub fn set_url(&mut self, id: TabId, url: Url) -> bool {
        match self.tabs.get_mut(&id) {
            Some(tab) => {
                tab.url = url;
                true
            }
            None => false,
        }
    }

    /// Look up a tab.
    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.get(&id)
    }

    /// Number of registered tabs.
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Send a message to every tab whose hostname equals `domain` exactly.
    ///
    /// Fire-and-forget: a tab whose agent is gone (or not loaded yet) is
    /// logged and skipped, never aborting delivery to the rest. Returns
    /// how many tabs accepted the message.
    pub fn broadcast(&self, domain: &str, message: &PageMessage) -> usize {
        let mut delivered = 0;
        for tab in self.tabs.values() {
            if tab.hostname() != Some(domain) {
                continue;
            }
            if tab.send(message.clone()) {
                delivered += 1;
            } else {
                warn!(tab = tab.id.raw(), domain, "could not reach tab agent");
            }
        }
        debug!(domain, delivered, "broadcast complete");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeshift_core::settings::FontSettings;

    fn apply_message() -> PageMessage {
        PageMessage::ApplySettings {
            settings: FontSettings::default(),
            domain: "example.com".to_string(),
        }
    }

    #[test]
    fn test_broadcast_exact_hostname_only() {
        let mut registry = TabRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();

        registry.register(Url::parse("https://example.com/page").unwrap(), tx_a);
        registry.register(Url::parse("https://sub.example.com/").unwrap(), tx_b);
        registry.register(Url::parse("http://example.com:8080/other").unwrap(), tx_c);

        let delivered = registry.broadcast("example.com", &apply_message());

        // Exact hostname match; scheme and port are ignored, subdomains
        // are not.
        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_survives_dead_agent() {
        let mut registry = TabRegistry::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        drop(rx_dead);
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();

        registry.register(Url::parse("https://example.com/a").unwrap(), tx_dead);
        registry.register(Url::parse("https://example.com/b").unwrap(), tx_live);

        let delivered = registry.broadcast("example.com", &apply_message());
        assert_eq!(delivered, 1);
        assert!(rx_live.try_recv().is_ok());
    }

    #[test]
    fn test_hostless_url_never_matches() {
        let mut registry = TabRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(Url::parse("about:blank").unwrap(), tx);

        assert_eq!(registry.broadcast("example.com", &apply_message()), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_navigation_updates_matching() {
        let mut registry = TabRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.register(Url::parse("https://old.example/").unwrap(), tx);

        assert_eq!(registry.broadcast("example.com", &apply_message()), 0);

        assert!(registry.set_url(id, Url::parse("https://example.com/").unwrap()));
        assert_eq!(registry.broadcast("example.com", &apply_message()), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_unregister() {
        let mut registry = TabRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(Url::parse("https://example.com/").unwrap(), tx);

        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(id));
        assert!(registry.is_empty());
        assert!(!registry.unregister(id));
    }
}
