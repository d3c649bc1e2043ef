//! # Typeshift CSS
//!
//! CSS rule generation from typography override settings.
//!
//! ## Emission rules
//!
//! 1. One rule with the selector `body *:not(<exclusions>)`
//! 2. Only truthy/non-zero fields produce declarations
//! 3. Every declaration is forced with `!important`
//! 4. Text shadow is emitted only when its own enabled flag is set

use tracing::debug;
use typeshift_core::settings::{FontSettings, TextShadow};

/// Element selectors excluded from font overrides: interactive controls,
/// navigation, and code-bearing elements.
pub const EXCLUDED_SELECTORS: &[&str] = &[
    "button",
    "input",
    "textarea",
    "select",
    "nav",
    "nav *",
    ".navigation",
    ".navigation *",
    "code",
    "pre",
    "kbd",
    "samp",
    "var",
    "[class*=\"code\"]",
    "[class*=\"Code\"]",
    "[contenteditable=\"true\"]",
];

/// Font families assumed to be installed locally; anything else gets a
/// remote stylesheet link.
pub const SYSTEM_FONTS: &[&str] = &[
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Georgia",
    "Verdana",
    "Courier New",
    "Impact",
    "Comic Sans MS",
    "Trebuchet MS",
];

/// The selector every generated rule targets.
pub fn page_selector() -> String {
    format!("body *:not({})", EXCLUDED_SELECTORS.join(", "))
}

/// Format a shadow as a CSS `text-shadow` value.
pub fn shadow_value(shadow: &TextShadow) -> String {
    format!(
        "{}px {}px {}px {}",
        shadow.x, shadow.y, shadow.blur, shadow.color
    )
}

/// Generate the stylesheet text for a settings snapshot.
///
/// Returns an empty string when no field produces a declaration.
pub fn generate_css(settings: &FontSettings) -> String {
    let mut rules = Vec::new();

    if !settings.font_family.is_empty() {
        rules.push(format!(
            "font-family: \"{}\", sans-serif !important",
            settings.font_family
        ));
    }

    if settings.font_size != 0.0 {
        rules.push(format!("font-size: {}px !important", settings.font_size));
    }

    if settings.line_height != 0.0 {
        rules.push(format!("line-height: {} !important", settings.line_height));
    }

    if settings.letter_spacing != 0.0 {
        rules.push(format!(
            "letter-spacing: {}px !important",
            settings.letter_spacing
        ));
    }

    if settings.text_shadow.enabled {
        rules.push(format!(
            "text-shadow: {} !important",
            shadow_value(&settings.text_shadow)
        ));
    }

    if rules.is_empty() {
        return String::new();
    }

    debug!(declarations = rules.len(), "generated stylesheet");
    format!("{} {{\n  {};\n}}", page_selector(), rules.join(";\n  "))
}

/// Whether a family is on the local allowlist.
pub fn is_system_font(family: &str) -> bool {
    SYSTEM_FONTS.contains(&family)
}

/// Remote stylesheet URL for a font family, by name. No existence check
/// is performed; a family that does not exist simply fails to load.
pub fn font_stylesheet_url(family: &str) -> String {
    format!(
        "https://fonts.googleapis.com/css2?family={}:wght@300;400;500;600;700&display=swap",
        family.replace(' ', "+")
    )
}
