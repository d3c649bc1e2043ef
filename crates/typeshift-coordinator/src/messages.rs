//! The inter-component message contract.
//!
//! Requests travel from the control surface (or a page agent) to the
//! coordinator and always produce a [`Response`] envelope. Page-directed
//! pushes ([`PageMessage`]) are fire-and-forget. Everything is tagged with
//! an `action` field and keeps the camelCase wire layout.

use serde::{Deserialize, Serialize};
use typeshift_core::settings::{FontSettings, Scope};
use typeshift_store::StorageChange;

/// A request to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    GetSettings { domain: String, scope: Scope },

    #[serde(rename_all = "camelCase")]
    SaveSettings {
        domain: String,
        settings: FontSettings,
        scope: Scope,
        enabled: bool,
    },

    #[serde(rename_all = "camelCase")]
    ResetSettings { domain: String, scope: Scope },

    #[serde(rename_all = "camelCase")]
    BroadcastSettings { domain: String, data: PageMessage },

    GetSyncStatus,
}

/// A message directed at a page agent. The first three are pushes; the
/// agent answers `getSettings` with its in-memory snapshot, not storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageMessage {
    #[serde(rename_all = "camelCase")]
    ApplySettings {
        settings: FontSettings,
        domain: String,
    },

    #[serde(rename_all = "camelCase")]
    ResetSettings { domain: String },

    #[serde(rename_all = "camelCase")]
    StorageChanged { changes: Vec<StorageChange> },

    GetSettings,
}

/// The flat `{success, ...}` response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<FontSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_global_settings: Option<bool>,
}

impl Response {
    /// A bare success.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            settings: None,
            enabled: None,
            site_count: None,
            has_global_settings: None,
        }
    }

    /// A failure with a message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::ok()
        }
    }

    /// Success carrying a settings snapshot and an enabled flag.
    pub fn with_settings(settings: FontSettings, enabled: bool) -> Self {
        Self {
            settings: Some(settings),
            enabled: Some(enabled),
            ..Self::ok()
        }
    }

    /// Success carrying sync status counts.
    pub fn with_status(site_count: usize, has_global_settings: bool) -> Self {
        Self {
            site_count: Some(site_count),
            has_global_settings: Some(has_global_settings),
            ..Self::ok()
        }
    }
}
