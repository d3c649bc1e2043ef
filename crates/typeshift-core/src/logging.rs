//! Logging setup.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level when no filter is given.
    pub level: Level,
    /// Use the compact single-line format.
    pub compact: bool,
    /// Custom filter string (e.g., "typeshift_store=debug").
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            compact: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Debug-level configuration.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            ..Default::default()
        }
    }

    /// Set a custom filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(config: LogConfig) {
    let filter = match config.filter {
        Some(ref custom) => EnvFilter::try_new(custom)
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string())),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string())),
    };

    if config.compact {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
