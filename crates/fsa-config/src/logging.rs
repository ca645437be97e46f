//! Structured logging utilities for fsassets components.
//!
//! Provides consistent logging with component tags (`SERVICE`, `FALLBACK`,
//! `STATS`, `CLI`) and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use fsa_config::log_service_info;
//!
//! log_service_info!("Asset stored", id = "a1", bytes = 5u64);
//! log_stats_info!("Read stats", reads = 10u64);
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

// === SERVICE logging macros ===

#[macro_export]
macro_rules! log_service_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "SERVICE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_service_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "SERVICE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_service_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "SERVICE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_service_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "SERVICE", $($key = $value,)* $msg)
    };
}

// === FALLBACK logging macros ===

#[macro_export]
macro_rules! log_fallback_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "FALLBACK", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_fallback_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "FALLBACK", $($key = $value,)* $msg)
    };
}

// === STATS logging macros ===

#[macro_export]
macro_rules! log_stats_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "STATS", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_stats_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "STATS", $($key = $value,)* $msg)
    };
}

// === CLI logging macros ===

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CLI", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at application startup. `RUST_LOG` takes precedence.
/// Logs go to stderr; stdout is reserved for command output.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
