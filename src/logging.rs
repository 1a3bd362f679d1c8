//! Logging setup.
//!
//! Events go to stderr so they never mix with chat output on stdout.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::channel::ConfigError;

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) -> Result<(), ConfigError> {
    let level = parse_log_level(level)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Invalid(format!("Failed to set logger: {}", e)))?;

    tracing::debug!("Logging initialized with level: {}", level);
    Ok(())
}

/// Parse log level string
pub fn parse_log_level(level: &str) -> Result<Level, ConfigError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ConfigError::Invalid(format!("Invalid log level: {}", level))),
    }
}
