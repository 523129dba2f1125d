//! Logging configuration and subscriber setup

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{ReconError, ReconResult};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// General information
    Info,
    /// Debug information
    Debug,
    /// Very verbose debug information
    Trace,
}

impl LogLevel {
    pub fn parse(level: &str) -> ReconResult<Self> {
        match level.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ReconError::ConfigError {
                message: format!(
                    "Invalid log level: {}. Valid levels: error, warn, info, debug, trace",
                    other
                ),
            }),
        }
    }

    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line format
    #[default]
    Pretty,
    /// Single-line text format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl LogFormat {
    pub fn parse(format: &str) -> ReconResult<Self> {
        match format.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ReconError::ConfigError {
                message: format!("Invalid log format: {}. Valid formats: pretty, compact, json", other),
            }),
        }
    }
}

/// Filter for `level`, unless `RUST_LOG` is set
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// command output.
pub fn init(level: LogLevel, format: LogFormat) -> ReconResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Pretty => builder.with_target(false).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };

    result.map_err(|e| ReconError::ConfigError {
        message: format!("Failed to initialize logging: {}", e),
    })?;

    tracing::debug!("Logging initialized with level {:?}, format {:?}", level, format);
    Ok(())
}

/// Log version and platform once at startup
pub fn log_system_info() {
    tracing::info!("FaceRebuild {}", env!("CARGO_PKG_VERSION"));

    #[cfg(target_os = "macos")]
    tracing::debug!("Platform: macOS");
    #[cfg(target_os = "linux")]
    tracing::debug!("Platform: Linux");
    #[cfg(target_os = "windows")]
    tracing::debug!("Platform: Windows");
}
