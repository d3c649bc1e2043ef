//! # Typeshift Store
//!
//! The synced key-value storage area for Typeshift and the typed settings
//! layer on top of it.
//!
//! ## Persisted layout
//!
//! ```text
//! globalSettings            FontSettings snapshot (global scope)
//! site_<hostname>           FontSettings snapshot (site scope)
//! enabledSites              hostname -> bool; absent entry means enabled
//! ```
//!
//! Snapshots are written wholesale on save and removed on reset; there is
//! no schema versioning and no migration beyond the no-op hook.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use typeshift_core::settings::{
    effective_settings, site_key, FontSettings, Scope, ENABLED_SITES_KEY, GLOBAL_SETTINGS_KEY,
    SITE_KEY_PREFIX,
};
use typeshift_core::TypeshiftError;

/// Capacity of the storage change broadcast channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

// ==================== Errors ====================

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

// Lets callers above the store, like the smoke harness, bubble storage
// failures with `?` into the workspace-level error.
impl From<StoreError> for TypeshiftError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialize(e) => TypeshiftError::Serde(e),
            StoreError::Io(e) => TypeshiftError::Io(e),
            StoreError::CorruptSnapshot(msg) => TypeshiftError::storage(msg),
        }
    }
}

// ==================== Change events ====================

/// A single key mutation in the storage area. Carried on the page
/// message channel as well, so it keeps the camelCase wire layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<JsonValue>,
    pub new_value: Option<JsonValue>,
}

impl StorageChange {
    /// Whether this change is relevant to the given site: its own site
    /// key, the global key, or the enabled-sites map.
    pub fn affects_site(&self, domain: &str) -> bool {
        self.key == site_key(domain)
            || self.key == GLOBAL_SETTINGS_KEY
            || self.key == ENABLED_SITES_KEY
    }
}

// ==================== SyncStorage ====================

/// The raw synced key-value area.
///
/// Values are stored as JSON, mirroring what the typed layer writes. Every
/// mutation is published on a broadcast channel so page agents can react
/// to changes they did not initiate themselves.
#[derive(Debug, Clone)]
pub struct SyncStorage {
    entries: Arc<RwLock<HashMap<String, JsonValue>>>,
    change_tx: broadcast::Sender<StorageChange>,
}

impl SyncStorage {
    /// Create an empty storage area.
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            change_tx,
        }
    }

    /// Subscribe to storage change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.change_tx.subscribe()
    }

    /// Get one value.
    pub async fn get(&self, key: &str) -> Option<JsonValue> {
        self.entries.read().await.get(key).cloned()
    }

    /// Get several values in one pass.
    pub async fn get_many(&self, keys: &[&str]) -> HashMap<String, JsonValue> {
        let entries = self.entries.read().await;
        keys.iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    /// Set one value, publishing the change.
    pub async fn set(&self, key: &str, value: JsonValue) {
        let old_value = {
            let mut entries = self.entries.write().await;
            entries.insert(key.to_string(), value.clone())
        };
        debug!(key, "storage set");
        self.publish(StorageChange {
            key: key.to_string(),
            old_value,
            new_value: Some(value),
        });
    }

    /// Remove one key, publishing the change. Returns whether it existed.
    pub async fn remove(&self, key: &str) -> bool {
        let old_value = {
            let mut entries = self.entries.write().await;
            entries.remove(key)
        };
        let existed = old_value.is_some();
        if existed {
            debug!(key, "storage remove");
            self.publish(StorageChange {
                key: key.to_string(),
                old_value,
                new_value: None,
            });
        }
        existed
    }

    /// Remove every key, publishing one change per removed entry.
    pub async fn clear(&self) {
        let drained: Vec<(String, JsonValue)> = {
            let mut entries = self.entries.write().await;
            entries.drain().collect()
        };
        info!(count = drained.len(), "storage cleared");
        for (key, old_value) in drained {
            self.publish(StorageChange {
                key,
                old_value: Some(old_value),
                new_value: None,
            });
        }
    }

    /// All keys currently present.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Whether a key is present.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Migration hook. The layout has never changed shape; this exists so
    /// an upgrade path has somewhere to live.
    pub async fn migrate(&self) {}

    /// Load a JSON snapshot from disk. A missing file yields an empty
    /// area; no change events are published for loaded entries.
    pub async fn load_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "no snapshot on disk, starting empty");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let map: HashMap<String, JsonValue> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::CorruptSnapshot(e.to_string()))?;

        let mut entries = self.entries.write().await;
        *entries = map;
        info!(?path, count = entries.len(), "snapshot loaded");
        Ok(())
    }

    /// Persist the current contents as a JSON snapshot.
    pub async fn persist_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let entries = self.entries.read().await;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(path, raw)?;
        debug!(?path, count = entries.len(), "snapshot persisted");
        Ok(())
    }

    fn publish(&self, change: StorageChange) {
        // No subscribers is fine; agents come and go with page loads.
        if let Err(e) = self.change_tx.send(change) {
            debug!("no storage change subscribers: {}", e);
        }
    }
}

impl Default for SyncStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Default on-disk snapshot location.
pub fn default_snapshot_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("typeshift")
        .join("sync.json")
}

// ==================== SyncStatus ====================

/// Summary of what the storage area currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    /// Number of per-site settings keys.
    pub site_count: usize,
    /// Whether a global settings snapshot exists.
    pub has_global_settings: bool,
}

// ==================== SettingsStore ====================

/// Typed settings operations over the raw storage area.
///
/// Cheap to clone; every component holds its own handle to the same
/// underlying area.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    storage: SyncStorage,
}

impl SettingsStore {
    pub fn new(storage: SyncStorage) -> Self {
        Self { storage }
    }

    /// The raw storage area underneath.
    pub fn storage(&self) -> &SyncStorage {
        &self.storage
    }

    /// Subscribe to raw storage change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.storage.subscribe()
    }

    /// First-install seeding: defaults for the global scope and an empty
    /// enabled-sites map. Does nothing when global settings already exist.
    pub async fn seed_defaults(&self) -> Result<(), StoreError> {
        if self.storage.contains(GLOBAL_SETTINGS_KEY).await {
            return Ok(());
        }
        self.storage
            .set(
                GLOBAL_SETTINGS_KEY,
                serde_json::to_value(FontSettings::default())?,
            )
            .await;
        self.storage
            .set(ENABLED_SITES_KEY, JsonValue::Object(Default::default()))
            .await;
        info!("seeded default settings");
        Ok(())
    }

    /// Settings for one scope plus the effective enabled flag for the
    /// domain. Falls back to built-in defaults when the key is absent.
    pub async fn get_settings(
        &self,
        domain: &str,
        scope: Scope,
    ) -> Result<(FontSettings, bool), StoreError> {
        let key = scope.storage_key(domain);
        let settings = match self.storage.get(&key).await {
            Some(value) => serde_json::from_value(value)?,
            None => FontSettings::default(),
        };
        let enabled = self.site_enabled(domain).await;
        Ok((settings, enabled))
    }

    /// Write a settings snapshot wholesale and record the enabled flag
    /// for the domain.
    pub async fn save_settings(
        &self,
        domain: &str,
        scope: Scope,
        settings: &FontSettings,
        enabled: bool,
    ) -> Result<(), StoreError> {
        let key = scope.storage_key(domain);
        self.storage.set(&key, serde_json::to_value(settings)?).await;

        let mut enabled_sites = self.enabled_sites().await;
        enabled_sites.insert(domain.to_string(), enabled);
        self.storage
            .set(ENABLED_SITES_KEY, serde_json::to_value(&enabled_sites)?)
            .await;

        debug!(domain, ?scope, enabled, "settings saved");
        Ok(())
    }

    /// Remove the scoped key. The enabled-sites entry is deliberately
    /// left in place.
    pub async fn reset_settings(&self, domain: &str, scope: Scope) -> bool {
        let key = scope.storage_key(domain);
        let removed = self.storage.remove(&key).await;
        debug!(domain, ?scope, removed, "settings reset");
        removed
    }

    /// Remove every key in the area.
    pub async fn clear_all(&self) {
        self.storage.clear().await;
    }

    /// Effective enabled flag for a domain; an absent entry means enabled.
    pub async fn site_enabled(&self, domain: &str) -> bool {
        self.enabled_sites()
            .await
            .get(domain)
            .copied()
            .unwrap_or(true)
    }

    /// Resolve the settings a page at `domain` should render, if any.
    /// All three keys are read in one pass so the resolution works off a
    /// single consistent view of the area.
    pub async fn resolve_effective(
        &self,
        domain: &str,
    ) -> Result<Option<FontSettings>, StoreError> {
        let key = site_key(domain);
        let mut values = self
            .storage
            .get_many(&[key.as_str(), GLOBAL_SETTINGS_KEY, ENABLED_SITES_KEY])
            .await;

        let site = match values.remove(key.as_str()) {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        let global = match values.remove(GLOBAL_SETTINGS_KEY) {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        let enabled = match values.remove(ENABLED_SITES_KEY) {
            Some(value) => serde_json::from_value::<HashMap<String, bool>>(value)
                .unwrap_or_else(|e| {
                    warn!("enabled-sites map is malformed, treating as empty: {}", e);
                    HashMap::new()
                })
                .get(domain)
                .copied()
                .unwrap_or(true),
            None => true,
        };
        Ok(effective_settings(site, global, enabled))
    }

    /// Count of site keys and presence of global settings.
    pub async fn sync_status(&self) -> SyncStatus {
        let keys = self.storage.keys().await;
        SyncStatus {
            site_count: keys.iter().filter(|k| k.starts_with(SITE_KEY_PREFIX)).count(),
            has_global_settings: keys.iter().any(|k| k == GLOBAL_SETTINGS_KEY),
        }
    }

    async fn enabled_sites(&self) -> HashMap<String, bool> {
        match self.storage.get(ENABLED_SITES_KEY).await {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("enabled-sites map is malformed, treating as empty: {}", e);
                HashMap::new()
            }),
            None => HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SettingsStore {
        SettingsStore::new(SyncStorage::new())
    }

    fn roboto() -> FontSettings {
        FontSettings {
            enabled: true,
            font_family: "Roboto".to_string(),
            font_size: 18.0,
            line_height: 1.5,
            letter_spacing: 0.0,
            text_shadow: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_get_absent_site_returns_defaults() {
        let store = store();
        let (settings, enabled) = store.get_settings("example.com", Scope::Site).await.unwrap();
        assert_eq!(settings, FontSettings::default());
        assert!(enabled);
    }

    #[tokio::test]
    async fn test_save_get_round_trip() {
        let store = store();
        let saved = roboto();
        store
            .save_settings("example.com", Scope::Site, &saved, true)
            .await
            .unwrap();

        let (settings, enabled) = store.get_settings("example.com", Scope::Site).await.unwrap();
        assert_eq!(settings, saved);
        assert!(enabled);

        // Global scope is unaffected by a site save.
        let (global, _) = store.get_settings("example.com", Scope::Global).await.unwrap();
        assert_eq!(global, FontSettings::default());
    }

    #[tokio::test]
    async fn test_reset_keeps_enabled_entry() {
        let store = store();
        store
            .save_settings("example.com", Scope::Site, &roboto(), false)
            .await
            .unwrap();

        assert!(store.reset_settings("example.com", Scope::Site).await);

        let (settings, enabled) = store.get_settings("example.com", Scope::Site).await.unwrap();
        assert_eq!(settings, FontSettings::default());
        // enabledSites entry survives a reset.
        assert!(!enabled);
    }

    #[tokio::test]
    async fn test_absent_enabled_entry_means_enabled() {
        let store = store();
        assert!(store.site_enabled("never-saved.example").await);
    }

    #[tokio::test]
    async fn test_resolve_effective_site_wins() {
        let store = store();
        store.seed_defaults().await.unwrap();
        store
            .save_settings("example.com", Scope::Site, &roboto(), true)
            .await
            .unwrap();

        let resolved = store.resolve_effective("example.com").await.unwrap().unwrap();
        assert_eq!(resolved.font_family, "Roboto");

        // A domain with no site key resolves to the seeded global snapshot.
        let other = store.resolve_effective("other.example").await.unwrap().unwrap();
        assert_eq!(other, FontSettings::default());
    }

    #[tokio::test]
    async fn test_resolve_effective_disabled_site() {
        let store = store();
        store
            .save_settings("example.com", Scope::Site, &roboto(), false)
            .await
            .unwrap();
        assert!(store.resolve_effective("example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sync_status_and_clear_all() {
        let store = store();
        store.seed_defaults().await.unwrap();
        store
            .save_settings("a.example", Scope::Site, &roboto(), true)
            .await
            .unwrap();
        store
            .save_settings("b.example", Scope::Site, &roboto(), true)
            .await
            .unwrap();

        let status = store.sync_status().await;
        assert_eq!(status.site_count, 2);
        assert!(status.has_global_settings);

        store.clear_all().await;
        let status = store.sync_status().await;
        assert_eq!(status.site_count, 0);
        assert!(!status.has_global_settings);
    }

    #[tokio::test]
    async fn test_seed_defaults_is_idempotent() {
        let store = store();
        store.seed_defaults().await.unwrap();
        store
            .save_settings("example.com", Scope::Global, &roboto(), true)
            .await
            .unwrap();
        // A second seed must not clobber the saved global snapshot.
        store.seed_defaults().await.unwrap();
        let (global, _) = store.get_settings("example.com", Scope::Global).await.unwrap();
        assert_eq!(global.font_family, "Roboto");
    }

    #[tokio::test]
    async fn test_change_events_on_save() {
        let store = store();
        let mut rx = store.subscribe();

        store
            .save_settings("example.com", Scope::Site, &roboto(), true)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.key, "site_example.com");
        assert!(first.affects_site("example.com"));
        assert!(!first.affects_site("other.example"));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.key, ENABLED_SITES_KEY);
        // The enabled-sites map is relevant to every site.
        assert!(second.affects_site("other.example"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "typeshift-store-test-{}.json",
            std::process::id()
        ));

        let store = store();
        store
            .save_settings("example.com", Scope::Site, &roboto(), true)
            .await
            .unwrap();
        store.storage().persist_snapshot(&path).await.unwrap();

        let reloaded = SettingsStore::new(SyncStorage::new());
        reloaded.storage().load_snapshot(&path).await.unwrap();
        let (settings, _) = reloaded
            .get_settings("example.com", Scope::Site)
            .await
            .unwrap();
        assert_eq!(settings.font_family, "Roboto");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_get_many_skips_absent_keys() {
        let storage = SyncStorage::new();
        storage.set("a", serde_json::json!(1)).await;
        storage.set("b", serde_json::json!(2)).await;

        let values = storage.get_many(&["a", "b", "missing"]).await;
        assert_eq!(values.len(), 2);
        assert_eq!(values["a"], serde_json::json!(1));
        assert_eq!(values["b"], serde_json::json!(2));
        assert!(!values.contains_key("missing"));
    }

    #[tokio::test]
    async fn test_resolve_effective_malformed_enabled_map() {
        let store = store();
        store
            .save_settings("example.com", Scope::Site, &roboto(), true)
            .await
            .unwrap();
        // Clobber the map with garbage; the site stays enabled.
        store
            .storage()
            .set(ENABLED_SITES_KEY, serde_json::json!("oops"))
            .await;

        let resolved = store.resolve_effective("example.com").await.unwrap();
        assert_eq!(resolved.unwrap().font_family, "Roboto");
    }

    #[test]
    fn test_default_snapshot_path_shape() {
        let path = default_snapshot_path();
        assert!(path.ends_with("typeshift/sync.json"));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_bubbles_to_workspace_error() {
        let path = std::env::temp_dir().join(format!(
            "typeshift-store-corrupt-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "not json at all").unwrap();

        let err = store().storage().load_snapshot(&path).await.unwrap_err();
        let converted = TypeshiftError::from(err);
        assert!(matches!(converted, TypeshiftError::Storage(_)));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_is_empty() {
        let store = store();
        store
            .storage()
            .load_snapshot(Path::new("/nonexistent/typeshift/sync.json"))
            .await
            .unwrap();
        assert!(store.storage().keys().await.is_empty());
    }
}
