//! # Typeshift Coordinator
//!
//! The storage coordinator: sole owner of the persisted settings area,
//! request/response endpoint for the control surface, and relay of
//! settings changes to open pages.
//!
//! ## Architecture
//!
//! ```text
//! Control Surface ── Request ──→ Coordinator ──→ SettingsStore
//!                                    │
//!                                    └── PageMessage ──→ TabRegistry
//!                                                            │
//!                                            (hostname-matched fan-out)
//!                                                            ↓
//!                                                       Page Agents
//! ```
//!
//! Broadcasts are fire-and-forget; a tab without a live agent is logged
//! and skipped. Saves and resets routed through the coordinator trigger
//! explicit domain-matched broadcasts; changes written behind its back
//! reach agents through their own storage-change subscription.

pub mod messages;
pub mod tabs;

pub use messages::{PageMessage, Request, Response};
pub use tabs::{Tab, TabId, TabRegistry};

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use typeshift_store::SettingsStore;
use url::Url;

/// Grace period before re-applying settings to a freshly loaded tab,
/// tolerating a page agent that is not listening yet.
const TAB_LOAD_APPLY_DELAY: Duration = Duration::from_millis(100);

/// The storage coordinator.
#[derive(Clone)]
pub struct Coordinator {
    store: SettingsStore,
    tabs: Arc<RwLock<TabRegistry>>,
}

impl Coordinator {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            store,
            tabs: Arc::new(RwLock::new(TabRegistry::new())),
        }
    }

    /// First-install hook: seed defaults and run the migration no-op.
    pub async fn install(&self) -> Response {
        self.store.storage().migrate().await;
        match self.store.seed_defaults().await {
            Ok(()) => {
                info!("coordinator installed");
                Response::ok()
            }
            Err(e) => Response::err(e.to_string()),
        }
    }

    /// The settings store this coordinator owns.
    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Register an open tab with the channel its page agent reads.
    pub async fn register_tab(&self, url: Url, tx: mpsc::UnboundedSender<PageMessage>) -> TabId {
        self.tabs.write().await.register(url, tx)
    }

    /// Drop a closed tab.
    pub async fn unregister_tab(&self, id: TabId) -> bool {
        self.tabs.write().await.unregister(id)
    }

    /// Record a navigation for an open tab.
    pub async fn set_tab_url(&self, id: TabId, url: Url) -> bool {
        self.tabs.write().await.set_url(id, url)
    }

    /// Handle a raw JSON request. Anything that does not decode into a
    /// known action gets the canonical unknown-action failure.
    pub async fn handle_value(&self, value: JsonValue) -> Response {
        match serde_json::from_value::<Request>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!("unrecognized request: {}", e);
                Response::err("Unknown action")
            }
        }
    }

    /// Handle one request. Failures never escape; they are converted to
    /// `{success: false, error}` at this boundary.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetSettings { domain, scope } => {
                match self.store.get_settings(&domain, scope).await {
                    Ok((settings, enabled)) => Response::with_settings(settings, enabled),
                    Err(e) => Response::err(e.to_string()),
                }
            }

            Request::SaveSettings {
                domain,
                settings,
                scope,
                enabled,
            } => {
                if let Err(e) = self
                    .store
                    .save_settings(&domain, scope, &settings, enabled)
                    .await
                {
                    return Response::err(e.to_string());
                }
                self.broadcast(
                    &domain,
                    PageMessage::ApplySettings {
                        settings,
                        domain: domain.clone(),
                    },
                )
                .await;
                Response::ok()
            }

            Request::ResetSettings { domain, scope } => {
                self.store.reset_settings(&domain, scope).await;
                self.broadcast(
                    &domain,
                    PageMessage::ResetSettings {
                        domain: domain.clone(),
                    },
                )
                .await;
                Response::ok()
            }

            Request::BroadcastSettings { domain, data } => {
                self.broadcast(&domain, data).await;
                Response::ok()
            }

            Request::GetSyncStatus => {
                let status = self.store.sync_status().await;
                Response::with_status(status.site_count, status.has_global_settings)
            }
        }
    }

    /// Send a message to every tab whose hostname equals `domain`.
    pub async fn broadcast(&self, domain: &str, message: PageMessage) -> usize {
        self.tabs.read().await.broadcast(domain, &message)
    }

    /// A tab finished loading: re-resolve its effective settings and push
    /// them after a short grace period. Best-effort, cannot be cancelled;
    /// failures are logged only. Tabs on internal pages are skipped.
    pub async fn on_tab_loaded(&self, id: TabId) {
        let domain = {
            let tabs = self.tabs.read().await;
            match tabs.get(id).and_then(|t| t.hostname().map(String::from)) {
                Some(domain) => domain,
                None => return,
            }
        };

        let settings = match self.store.resolve_effective(&domain).await {
            Ok(Some(settings)) => settings,
            Ok(None) => return,
            Err(e) => {
                warn!(tab = id.raw(), "could not resolve settings: {}", e);
                return;
            }
        };

        let tabs = Arc::clone(&self.tabs);
        tokio::spawn(async move {
            tokio::time::sleep(TAB_LOAD_APPLY_DELAY).await;
            let tabs = tabs.read().await;
            match tabs.get(id) {
                Some(tab) => {
                    if !tab.send(PageMessage::ApplySettings {
                        settings,
                        domain: domain.clone(),
                    }) {
                        debug!(tab = id.raw(), domain, "agent not ready for re-apply");
                    }
                }
                None => debug!(tab = id.raw(), "tab closed before re-apply"),
            }
        });
    }
}
