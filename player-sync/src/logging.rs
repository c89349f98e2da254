//! Logging for the player observer
//!
//! Two separate concerns live here. The process-wide `tracing` subscriber is
//! configured through [`init_logging`] or [`init_logging_from_env`]; embedding
//! applications that render to the terminal usually want
//! [`LoggingMode::Silent`]. Domain warnings the observer raises for its host
//! (an unsupported item was bound, a native error could not be described)
//! go through the [`PlayerLogger`] collaborator, which defaults to
//! [`TracingLogger`].

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics with thread ids and source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// # Examples
///
/// ```rust,ignore
/// player_sync::logging::init_logging(LoggingMode::Development)?;
/// ```
///
/// # Environment Variables
///
/// - `PLAYER_LOG_LEVEL`: Override the filter (e.g. `player_sync=trace`)
/// - `RUST_LOG`: Used when `PLAYER_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_names(true)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from the `PLAYER_LOG_MODE` environment variable
///
/// - "silent" -> LoggingMode::Silent
/// - "development" -> LoggingMode::Development
/// - "debug" -> LoggingMode::Debug
///
/// Unset means silent. Any other value is rejected.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("PLAYER_LOG_MODE") {
        Ok(value) => parse_mode(&value)?,
        Err(_) => LoggingMode::Silent,
    };

    init_logging(mode)
}

fn parse_mode(value: &str) -> Result<LoggingMode, LoggingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "silent" => Ok(LoggingMode::Silent),
        "development" | "dev" => Ok(LoggingMode::Development),
        "debug" => Ok(LoggingMode::Debug),
        other => Err(LoggingError::InvalidEnv(format!(
            "PLAYER_LOG_MODE={}",
            other
        ))),
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(level) = std::env::var("PLAYER_LOG_LEVEL") {
        return EnvFilter::try_new(&level)
            .map_err(|e| LoggingError::InvalidEnv(format!("PLAYER_LOG_LEVEL={}: {}", level, e)));
    }
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(&rust_log)
            .map_err(|e| LoggingError::InvalidEnv(format!("RUST_LOG={}: {}", rust_log, e)));
    }
    Ok(EnvFilter::new(default_level))
}

/// Receives the warnings and errors the observer reports to its host
///
/// Calls are fire-and-forget and happen on the observer's worker thread.
pub trait PlayerLogger: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// [`PlayerLogger`] that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl PlayerLogger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "player_sync::host", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "player_sync::host", "{}", message);
    }
}

pub(crate) fn default_logger() -> Arc<dyn PlayerLogger> {
    Arc::new(TracingLogger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("debug").unwrap(), LoggingMode::Debug);
        assert_eq!(parse_mode(" Development ").unwrap(), LoggingMode::Development);
        assert_eq!(parse_mode("").unwrap(), LoggingMode::Silent);
        assert!(matches!(
            parse_mode("loud"),
            Err(LoggingError::InvalidEnv(_))
        ));
    }

    #[test]
    fn test_tracing_logger_does_not_panic_without_subscriber() {
        let logger = TracingLogger;
        logger.warn("unsupported item");
        logger.error("playback failed");
    }
}
