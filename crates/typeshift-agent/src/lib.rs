//! # Typeshift Page Agent
//!
//! One agent per page load. The agent resolves the effective settings for
//! its hostname, renders them as an injected stylesheet, and keeps them
//! applied against page scripts that wipe injected nodes.
//!
//! All of the agent's state lives in the [`PageAgent`] context: the
//! current settings snapshot and the handles to the (at most) one style
//! node and one font-link node it owns.

pub mod dom;

pub use dom::{InjectedNode, NodeId, NodeKind, PageDom};

use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use typeshift_coordinator::messages::{PageMessage, Response};
use typeshift_css::{font_stylesheet_url, generate_css, is_system_font};
use typeshift_core::settings::FontSettings;
use typeshift_store::{SettingsStore, StorageChange};

/// Minimum spacing between missing-style checks on DOM mutations.
const REAPPLY_INTERVAL: Duration = Duration::from_millis(500);

/// Per-page-load agent context.
pub struct PageAgent {
    domain: String,
    store: SettingsStore,
    dom: PageDom,
    current: Option<FontSettings>,
    style_node: Option<NodeId>,
    font_node: Option<NodeId>,
    reapply_interval: Duration,
    last_check: Option<Instant>,
}

impl PageAgent {
    /// Create an agent for a page at `domain`. Call [`attach`] to resolve
    /// and apply settings.
    ///
    /// [`attach`]: PageAgent::attach
    pub fn new(domain: impl Into<String>, store: SettingsStore) -> Self {
        Self {
            domain: domain.into(),
            store,
            dom: PageDom::new(),
            current: None,
            style_node: None,
            font_node: None,
            reapply_interval: REAPPLY_INTERVAL,
            last_check: None,
        }
    }

    /// Override the mutation-check throttle interval.
    pub fn with_reapply_interval(mut self, interval: Duration) -> Self {
        self.reapply_interval = interval;
        self
    }

    /// Hostname this agent was created for.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The in-memory snapshot, not storage.
    pub fn current_settings(&self) -> Option<&FontSettings> {
        self.current.as_ref()
    }

    /// The page document surface.
    pub fn dom(&self) -> &PageDom {
        &self.dom
    }

    /// Mutable page surface, for the host (and hostile page scripts).
    pub fn dom_mut(&mut self) -> &mut PageDom {
        &mut self.dom
    }

    /// Resolve effective settings from storage and apply them, removing
    /// styles when the site is disabled or nothing is configured.
    pub async fn attach(&mut self) {
        match self.store.resolve_effective(&self.domain).await {
            Ok(Some(settings)) => {
                self.apply_settings(settings);
                info!(domain = %self.domain, "agent attached with settings");
            }
            Ok(None) => {
                self.remove_styles();
                self.current = None;
                debug!(domain = %self.domain, "agent attached, nothing to apply");
            }
            Err(e) => warn!(domain = %self.domain, "could not load settings: {}", e),
        }
    }

    /// Apply a settings snapshot to the page. Idempotent: prior injected
    /// nodes are removed first.
    pub fn apply_settings(&mut self, settings: FontSettings) {
        self.remove_styles();

        let css = generate_css(&settings);
        self.style_node = Some(self.dom.insert(NodeKind::Style, css));

        if !settings.font_family.is_empty() && !is_system_font(&settings.font_family) {
            let href = font_stylesheet_url(&settings.font_family);
            self.font_node = Some(self.dom.insert(NodeKind::FontLink, href));
        }

        debug!(domain = %self.domain, family = %settings.font_family, "settings applied");
        self.current = Some(settings);
    }

    /// Remove both injected nodes, if present.
    pub fn remove_styles(&mut self) {
        if let Some(id) = self.style_node.take() {
            self.dom.remove(id);
        }
        if let Some(id) = self.font_node.take() {
            self.dom.remove(id);
        }
    }

    /// Handle one inbound message.
    pub async fn handle_message(&mut self, message: PageMessage) -> Response {
        match message {
            PageMessage::ApplySettings { settings, .. } => {
                self.apply_settings(settings);
                Response::ok()
            }
            PageMessage::ResetSettings { .. } => {
                self.current = None;
                self.remove_styles();
                Response::ok()
            }
            PageMessage::StorageChanged { changes } => {
                if changes.iter().any(|c| c.affects_site(&self.domain)) {
                    self.attach().await;
                }
                Response::ok()
            }
            PageMessage::GetSettings => Response {
                settings: self.current.clone(),
                ..Response::ok()
            },
        }
    }

    /// A storage key changed; reload when it concerns this site.
    pub async fn handle_storage_change(&mut self, change: &StorageChange) {
        if change.affects_site(&self.domain) {
            self.attach().await;
        }
    }

    /// Element nodes were added to the page. Throttled: at most one
    /// missing-style check per interval; re-applies only when the
    /// injected style node has disappeared.
    pub fn on_mutation(&mut self) {
        let settings = match &self.current {
            Some(s) if s.enabled => s.clone(),
            _ => return,
        };

        if let Some(last) = self.last_check {
            if last.elapsed() < self.reapply_interval {
                return;
            }
        }
        self.last_check = Some(Instant::now());

        let style_present = self.style_node.map(|id| self.dom.contains(id)).unwrap_or(false);
        if !style_present {
            debug!(domain = %self.domain, "injected style vanished, re-applying");
            self.apply_settings(settings);
        }
    }

    /// Page teardown: remove injected nodes and drop state.
    pub fn detach(&mut self) {
        self.remove_styles();
        self.current = None;
        debug!(domain = %self.domain, "agent detached");
    }

    /// Drive the agent from its message channel and the storage change
    /// feed until the page goes away (message channel closed).
    pub async fn run(mut self, mut messages: mpsc::UnboundedReceiver<PageMessage>) {
        let mut changes = self.store.subscribe();
        self.attach().await;

        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => {
                        self.handle_message(message).await;
                    }
                    None => break,
                },
                change = changes.recv() => match change {
                    Ok(change) => self.handle_storage_change(&change).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(domain = %self.domain, missed, "storage feed lagged, reloading");
                        self.attach().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeshift_core::settings::Scope;
    use typeshift_store::SyncStorage;

    fn store() -> SettingsStore {
        SettingsStore::new(SyncStorage::new())
    }

    fn roboto() -> FontSettings {
        FontSettings {
            font_family: "Roboto".to_string(),
            ..Default::default()
        }
    }

    fn arial() -> FontSettings {
        FontSettings {
            font_family: "Arial".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_attach_with_site_settings() {
        let store = store();
        store
            .save_settings("example.com", Scope::Site, &roboto(), true)
            .await
            .unwrap();

        let mut agent = PageAgent::new("example.com", store);
        agent.attach().await;

        assert_eq!(agent.current_settings().unwrap().font_family, "Roboto");
        // One style node and one font link (Roboto is not a system font).
        assert_eq!(agent.dom().len(), 2);
    }

    #[tokio::test]
    async fn test_system_font_has_no_link_node() {
        let mut agent = PageAgent::new("example.com", store());
        agent.apply_settings(arial());
        assert_eq!(agent.dom().len(), 1);
    }

    #[tokio::test]
    async fn test_attach_disabled_site_removes_styles() {
        let store = store();
        store
            .save_settings("example.com", Scope::Site, &roboto(), false)
            .await
            .unwrap();

        let mut agent = PageAgent::new("example.com", store);
        agent.attach().await;

        assert!(agent.current_settings().is_none());
        assert!(agent.dom().is_empty());
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let mut agent = PageAgent::new("example.com", store());
        agent.apply_settings(roboto());
        agent.apply_settings(roboto());
        agent.apply_settings(arial());
        // Never more than the agent's own pair of nodes.
        assert_eq!(agent.dom().len(), 1);
    }

    #[tokio::test]
    async fn test_messages() {
        let mut agent = PageAgent::new("example.com", store());

        let response = agent
            .handle_message(PageMessage::ApplySettings {
                settings: roboto(),
                domain: "example.com".to_string(),
            })
            .await;
        assert!(response.success);
        assert_eq!(agent.dom().len(), 2);

        // getSettings answers from memory, not storage.
        let response = agent.handle_message(PageMessage::GetSettings).await;
        assert_eq!(response.settings.unwrap().font_family, "Roboto");

        let response = agent
            .handle_message(PageMessage::ResetSettings {
                domain: "example.com".to_string(),
            })
            .await;
        assert!(response.success);
        assert!(agent.dom().is_empty());
        assert!(agent.current_settings().is_none());
    }

    #[tokio::test]
    async fn test_mutation_reapplies_wiped_style() {
        let mut agent =
            PageAgent::new("example.com", store()).with_reapply_interval(Duration::ZERO);
        agent.apply_settings(roboto());

        agent.dom_mut().wipe();
        assert!(agent.dom().is_empty());

        agent.on_mutation();
        assert_eq!(agent.dom().len(), 2);
        assert_eq!(agent.current_settings().unwrap().font_family, "Roboto");
    }

    #[tokio::test]
    async fn test_mutation_checks_are_throttled() {
        let mut agent = PageAgent::new("example.com", store());
        agent.apply_settings(roboto());

        // First mutation runs a check while styles are still fine.
        agent.on_mutation();

        agent.dom_mut().wipe();
        agent.on_mutation();
        // Within the throttle window nothing is re-applied yet.
        assert!(agent.dom().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_noop_without_settings() {
        let mut agent =
            PageAgent::new("example.com", store()).with_reapply_interval(Duration::ZERO);
        agent.on_mutation();
        assert!(agent.dom().is_empty());
    }

    #[tokio::test]
    async fn test_storage_change_reloads() {
        let store = store();
        let mut agent = PageAgent::new("example.com", store.clone());
        agent.attach().await;
        assert!(agent.current_settings().is_none());

        let mut changes = store.subscribe();
        store
            .save_settings("example.com", Scope::Site, &roboto(), true)
            .await
            .unwrap();

        let change = changes.recv().await.unwrap();
        agent.handle_storage_change(&change).await;
        assert_eq!(agent.current_settings().unwrap().font_family, "Roboto");
    }

    #[tokio::test]
    async fn test_storage_change_for_other_site_ignored() {
        let store = store();
        let mut agent = PageAgent::new("example.com", store.clone());
        let mut changes = store.subscribe();

        store
            .storage()
            .set("site_other.example", serde_json::to_value(roboto()).unwrap())
            .await;
        let change = changes.recv().await.unwrap();
        agent.handle_storage_change(&change).await;
        assert!(agent.current_settings().is_none());
    }

    #[tokio::test]
    async fn test_detach_removes_everything() {
        let mut agent = PageAgent::new("example.com", store());
        agent.apply_settings(roboto());
        agent.detach();
        assert!(agent.dom().is_empty());
        assert!(agent.current_settings().is_none());
    }

    #[tokio::test]
    async fn test_run_loop_applies_pushed_settings() {
        let store = store();
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = PageAgent::new("example.com", store);
        let handle = tokio::spawn(agent.run(rx));

        tx.send(PageMessage::ApplySettings {
            settings: roboto(),
            domain: "example.com".to_string(),
        })
        .unwrap();

        // Closing the channel ends the page load.
        drop(tx);
        handle.await.unwrap();
    }
}
