//! Typography override settings and scope resolution.
//!
//! A [`FontSettings`] value is an immutable snapshot: it is written to
//! storage wholesale on every save and never field-patched in place.

use serde::{Deserialize, Serialize};

/// Storage key for the global settings snapshot.
pub const GLOBAL_SETTINGS_KEY: &str = "globalSettings";

/// Prefix for per-site settings keys.
pub const SITE_KEY_PREFIX: &str = "site_";

/// Storage key for the per-site enabled map.
pub const ENABLED_SITES_KEY: &str = "enabledSites";

/// Build the storage key for a site's settings snapshot.
pub fn site_key(domain: &str) -> String {
    format!("{}{}", SITE_KEY_PREFIX, domain)
}

/// Text shadow parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextShadow {
    /// Whether the shadow is rendered at all.
    pub enabled: bool,
    /// Horizontal offset in pixels.
    pub x: i32,
    /// Vertical offset in pixels.
    pub y: i32,
    /// Blur radius in pixels.
    pub blur: i32,
    /// CSS color value.
    pub color: String,
}

impl Default for TextShadow {
    fn default() -> Self {
        Self {
            enabled: false,
            x: 1,
            y: 0,
            blur: 1,
            color: "#777777".to_string(),
        }
    }
}

/// A typography override snapshot for one scope.
///
/// Field names keep the camelCase storage layout so persisted snapshots
/// and wire messages stay byte-compatible across components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSettings {
    /// Master switch carried inside the snapshot itself.
    pub enabled: bool,

    /// Font family name; empty string means "leave the page font alone".
    pub font_family: String,

    /// Font size in pixels; zero means "no override".
    pub font_size: f32,

    /// Unitless line height; zero means "no override".
    pub line_height: f32,

    /// Letter spacing in pixels; zero means "no override".
    pub letter_spacing: f32,

    /// Text shadow parameters.
    pub text_shadow: TextShadow,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            font_family: String::new(),
            font_size: 16.0,
            line_height: 1.5,
            letter_spacing: 0.0,
            text_shadow: TextShadow::default(),
        }
    }
}

/// Whether a settings operation targets one site or the global default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Site,
}

impl Scope {
    /// Storage key for this scope. Site scope is keyed by hostname only;
    /// scheme and port are ignored.
    pub fn storage_key(&self, domain: &str) -> String {
        match self {
            Scope::Global => GLOBAL_SETTINGS_KEY.to_string(),
            Scope::Site => site_key(domain),
        }
    }
}

/// Resolve the settings a page should actually render.
///
/// Site override wins over global; a `false` enabled-sites entry
/// suppresses styling regardless of settings content; a snapshot whose
/// own `enabled` flag is off resolves to nothing. An absent enabled-sites
/// entry means enabled (callers pass `true`).
pub fn effective_settings(
    site: Option<FontSettings>,
    global: Option<FontSettings>,
    enabled: bool,
) -> Option<FontSettings> {
    if !enabled {
        return None;
    }
    site.or(global).filter(|s| s.enabled)
}
