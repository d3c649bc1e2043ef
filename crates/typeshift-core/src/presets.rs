//! Built-in typography presets.

use crate::settings::{FontSettings, TextShadow};
use serde::{Deserialize, Serialize};

/// Identifier for a built-in preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKey {
    Modern,
    Classic,
    Dyslexic,
    Professional,
}

/// A named typography bundle the control surface can copy into its form.
#[derive(Debug, Clone)]
pub struct Preset {
    pub key: PresetKey,
    pub name: &'static str,
    pub description: &'static str,
    pub settings: FontSettings,
}

/// The fixed preset table.
pub fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset {
            key: PresetKey::Modern,
            name: "Modern",
            description: "Clean, contemporary design",
            settings: FontSettings {
                enabled: true,
                font_family: "Inter".to_string(),
                font_size: 16.0,
                line_height: 1.6,
                letter_spacing: 0.0,
                text_shadow: TextShadow {
                    enabled: false,
                    x: 0,
                    y: 0,
                    blur: 0,
                    color: "#000000".to_string(),
                },
            },
        },
        Preset {
            key: PresetKey::Classic,
            name: "Classic",
            description: "Traditional serif style",
            settings: FontSettings {
                enabled: true,
                font_family: "Merriweather".to_string(),
                font_size: 17.0,
                line_height: 1.8,
                letter_spacing: 0.5,
                text_shadow: TextShadow {
                    enabled: true,
                    x: 1,
                    y: 1,
                    blur: 0,
                    color: "#cccccc".to_string(),
                },
            },
        },
        Preset {
            key: PresetKey::Dyslexic,
            name: "Dyslexic-Friendly",
            description: "Easy to read, high clarity",
            settings: FontSettings {
                enabled: true,
                font_family: "Open Sans".to_string(),
                font_size: 18.0,
                line_height: 2.0,
                letter_spacing: 1.5,
                text_shadow: TextShadow {
                    enabled: false,
                    x: 0,
                    y: 0,
                    blur: 0,
                    color: "#000000".to_string(),
                },
            },
        },
        Preset {
            key: PresetKey::Professional,
            name: "Professional",
            description: "Business-ready appearance",
            settings: FontSettings {
                enabled: true,
                font_family: "Roboto".to_string(),
                font_size: 15.0,
                line_height: 1.5,
                letter_spacing: 0.3,
                text_shadow: TextShadow {
                    enabled: true,
                    x: 1,
                    y: 0,
                    blur: 1,
                    color: "#777777".to_string(),
                },
            },
        },
    ]
}

/// Look up one preset by key.
pub fn preset(key: PresetKey) -> Preset {
    builtin_presets()
        .into_iter()
        .find(|p| p.key == key)
        .expect("builtin preset table covers every key")
}
