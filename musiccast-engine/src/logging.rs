//! Logging setup for MusicCast SDK hosts
//!
//! Library code only emits `tracing` events. Hosts pick how they are
//! rendered by installing a subscriber through this module once at startup.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber; events are discarded
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with thread ids and source locations
    Debug,
}

impl LoggingMode {
    /// Parse a mode name; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            _ => None,
        }
    }

    fn default_level(&self) -> &'static str {
        match self {
            LoggingMode::Silent => "off",
            LoggingMode::Development => "info",
            LoggingMode::Debug => "debug",
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `MUSICCAST_LOG_LEVEL`: Filter directive (e.g. `info`, `musiccast_engine=debug`)
/// - `RUST_LOG`: Used when `MUSICCAST_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    init_with_filter(mode, None)
}

/// Initialize logging with an explicit filter directive
///
/// The directive takes precedence over the environment.
pub fn init_logging_with_level(mode: LoggingMode, directive: &str) -> Result<(), LoggingError> {
    init_with_filter(mode, Some(directive))
}

fn init_with_filter(mode: LoggingMode, directive: Option<&str>) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = match directive {
        Some(directive) => parse_filter(directive)?,
        None => create_env_filter(mode.default_level())?,
    };

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_thread_ids(false)
                        .compact(),
                )
                .with(filter);

            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter);

            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from environment variables
///
/// Reads `MUSICCAST_LOG_MODE` (`silent`, `development`, `debug`);
/// defaults to silent when unset or unrecognised.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var("MUSICCAST_LOG_MODE")
        .ok()
        .and_then(|name| LoggingMode::from_name(&name))
        .unwrap_or(LoggingMode::Silent);

    init_logging(mode)
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    // First try MUSICCAST_LOG_LEVEL, then RUST_LOG, then default
    if let Ok(level) = std::env::var("MUSICCAST_LOG_LEVEL") {
        parse_filter(&level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        parse_filter(&rust_log)
    } else {
        parse_filter(default_level)
    }
}

fn parse_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(LoggingMode::from_name("Debug"), Some(LoggingMode::Debug));
        assert_eq!(LoggingMode::from_name("dev"), Some(LoggingMode::Development));
        assert_eq!(LoggingMode::from_name("loud"), None);
    }

    #[test]
    fn test_invalid_directive() {
        let err = init_logging_with_level(LoggingMode::Development, "musiccast=[").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter(_)));
    }
}
