//! Logging infrastructure for Weft.
//!
//! Weft emits `tracing` events everywhere; this module optionally installs a
//! subscriber controlled by environment variables.
//!
//! # Environment Variables
//!
//! - `WEFT_DEBUG=true|1|yes` - Enable debug logging
//! - `WEFT_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level
//! - `WEFT_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use weft_query::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! Installing the subscriber needs the `tracing-subscriber` feature; without
//! it `init` is a no-op and the application is expected to bring its own.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

/// Resolved logging settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    /// Whether `WEFT_DEBUG` is on.
    pub debug: bool,
    /// Log level directive.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
    /// Whether any logging was requested at all.
    pub requested: bool,
}

impl LogSettings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup("WEFT_DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        let explicit = lookup("WEFT_LOG_LEVEL");
        let fallback = if debug { "debug" } else { "warn" };
        let level = match explicit.as_deref().map(str::to_lowercase).as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => fallback,
        };
        let format = match lookup("WEFT_LOG_FORMAT").map(|f| f.to_lowercase()).as_deref() {
            Some("pretty") => LogFormat::Pretty,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Json,
        };
        Self {
            debug,
            level,
            format,
            requested: debug || explicit.is_some(),
        }
    }
}

/// Check if debug logging is enabled via `WEFT_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    LogSettings::from_env().debug
}

/// Initialize the Weft logging system.
///
/// Subsequent calls are no-ops. Nothing is installed unless `WEFT_DEBUG` or
/// `WEFT_LOG_LEVEL` is set.
pub fn init() {
    init_with(LogSettings::from_env());
}

/// Initialize logging with explicit settings.
pub fn init_with(settings: LogSettings) {
    INIT.call_once(|| {
        if !settings.requested {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = settings.level;
            let filter = EnvFilter::try_new(format!(
                "weft_orm={},weft_query={},weft_sqlite={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match settings.format {
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                LogFormat::Compact => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(
                    level = level,
                    format = ?settings.format,
                    "Weft logging initialized"
                );
            }
        }
    });
}

/// Macro for conditional debug logging.
///
/// Only logs if `WEFT_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! weft_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
