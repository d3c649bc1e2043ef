//! Typeshift Core Library
//!
//! Shared types, errors, presets, and logging setup for the Typeshift
//! typography override engine.

pub mod error;
pub mod logging;
pub mod presets;
pub mod settings;

pub use error::{TypeshiftError, TypeshiftResult};
pub use logging::{init_logging, LogConfig};
pub use presets::{builtin_presets, Preset, PresetKey};
pub use settings::{effective_settings, FontSettings, Scope, TextShadow};
