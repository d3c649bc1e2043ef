//! # Typeshift Panel
//!
//! Control-surface state for the active tab: the settings form, scope
//! selection, master toggle, and the save path. The panel writes storage
//! directly and pushes the result straight to the active page's agent,
//! in addition to whatever the coordinator broadcasts.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use typeshift_coordinator::messages::PageMessage;
use typeshift_core::presets::{preset, PresetKey};
use typeshift_core::settings::{FontSettings, Scope};
use typeshift_store::{SettingsStore, StoreError};

/// Per-popup-open control surface state.
pub struct Panel {
    domain: String,
    scope: Scope,
    enabled: bool,
    form: FontSettings,
    store: SettingsStore,
    active_tab: Option<mpsc::UnboundedSender<PageMessage>>,
}

impl Panel {
    /// Create a panel for the active tab's hostname.
    pub fn new(domain: impl Into<String>, store: SettingsStore) -> Self {
        Self {
            domain: domain.into(),
            scope: Scope::Site,
            enabled: true,
            form: FontSettings::default(),
            store,
            active_tab: None,
        }
    }

    /// Wire up the active page's message channel for direct pushes.
    pub fn connect_tab(&mut self, tx: mpsc::UnboundedSender<PageMessage>) {
        self.active_tab = Some(tx);
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Switch scope. Callers reload afterwards to reflect the other
    /// scope's stored values.
    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Master toggle.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The form contents.
    pub fn form(&self) -> &FontSettings {
        &self.form
    }

    /// Edit the form contents.
    pub fn form_mut(&mut self) -> &mut FontSettings {
        &mut self.form
    }

    /// Load the selected scope's settings into the form.
    ///
    /// The master toggle reflects the snapshot's own flag for global
    /// scope and the enabled-sites entry (default true) for site scope.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let (settings, site_enabled) = self.store.get_settings(&self.domain, self.scope).await?;
        self.enabled = match self.scope {
            Scope::Global => settings.enabled,
            Scope::Site => site_enabled,
        };
        self.form = settings;
        debug!(domain = %self.domain, scope = ?self.scope, "panel loaded");
        Ok(())
    }

    /// Copy a preset's typography bundle into the form. The master
    /// toggle is left alone.
    pub fn apply_preset(&mut self, key: PresetKey) {
        let preset = preset(key);
        let enabled = self.form.enabled;
        self.form = preset.settings;
        self.form.enabled = enabled;
        self.notify(&format!("Applied {} preset", preset.name));
    }

    /// Persist the form for the selected scope and push the result to
    /// the active page.
    pub async fn save(&mut self) -> Result<(), StoreError> {
        self.form.enabled = self.enabled;
        let settings = self.form.clone();

        self.store
            .save_settings(&self.domain, self.scope, &settings, self.enabled)
            .await?;

        self.push(PageMessage::ApplySettings {
            settings,
            domain: self.domain.clone(),
        });
        info!(domain = %self.domain, scope = ?self.scope, "settings saved");
        Ok(())
    }

    /// Remove the selected scope's stored settings, reload defaults into
    /// the form, and tell the active page to drop its styles.
    pub async fn reset(&mut self) -> Result<(), StoreError> {
        self.store.reset_settings(&self.domain, self.scope).await;
        self.load().await?;

        self.push(PageMessage::ResetSettings {
            domain: self.domain.clone(),
        });
        self.notify("Settings reset successfully");
        Ok(())
    }

    /// Delete every stored key, for all sites and the global scope.
    pub async fn clear_all(&mut self) -> Result<(), StoreError> {
        self.store.clear_all().await;
        self.load().await?;
        self.notify("All settings cleared");
        Ok(())
    }

    /// Number of sites with stored settings, for the status line.
    pub async fn site_count(&self) -> usize {
        self.store.sync_status().await.site_count
    }

    fn push(&self, message: PageMessage) {
        match &self.active_tab {
            Some(tx) => {
                if tx.send(message).is_err() {
                    warn!(domain = %self.domain, "active tab agent is gone");
                }
            }
            None => debug!(domain = %self.domain, "no active tab connected"),
        }
    }

    // Notification placeholder; a real surface would show a toast.
    fn notify(&self, message: &str) {
        info!(domain = %self.domain, "{}", message);
    }
}
