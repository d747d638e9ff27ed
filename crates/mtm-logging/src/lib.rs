//! Logging setup for `mtm-cli`.
//!
//! A single stderr-writing subscriber — this engine has one entry point, not
//! the launcher/TUI/GUI split a multi-surface application needs, so only
//! `init_cli_logging` is provided.
//!
//! ```rust,ignore
//! use mtm_logging::{init_cli_logging, LogConfig};
//!
//! let config = LogConfig::from_env();
//! let _guard = init_cli_logging(&config);
//!
//! tracing::info!("run started");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for `mtm-cli` logging.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable logging output.
    pub enabled: bool,
    /// `tracing_subscriber::EnvFilter` string.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: "info,mtm_core=debug".to_string(),
        }
    }
}

impl LogConfig {
    /// Create LogConfig from environment variables.
    ///
    /// Reads:
    /// - `MTM_LOG_ENABLED`: Set to "1" or "true" to enable logging
    /// - `MTM_LOG_FILTER`: Log filter string (default: "info,mtm_core=debug")
    pub fn from_env() -> Self {
        let enabled = std::env::var("MTM_LOG_ENABLED")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(true);

        let filter = std::env::var("MTM_LOG_FILTER")
            .unwrap_or_else(|_| "info,mtm_core=debug".to_string());

        Self { enabled, filter }
    }
}

/// Guard that keeps the logging worker thread alive. Keep this bound for the
/// duration of the program; logs may be lost if it is dropped early.
pub struct LogGuard {
    _worker_guard: tracing_appender::non_blocking::WorkerGuard,
}

fn create_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log filter '{}': {}", config.filter, e);
        EnvFilter::new("info")
    })
}

/// Initialize the process-wide `tracing` subscriber, writing compact,
/// ANSI-colored output to stderr. Returns `None` if logging is disabled.
pub fn init_cli_logging(config: &LogConfig) -> Option<LogGuard> {
    if !config.enabled {
        return None;
    }

    let filter = create_filter(config);
    let (non_blocking, worker_guard) = tracing_appender::non_blocking(std::io::stderr());

    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_writer(non_blocking)
        .with_filter(filter);

    tracing_subscriber::registry().with(layer).init();

    Some(LogGuard { _worker_guard: worker_guard })
}
