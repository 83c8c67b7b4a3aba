//! Logging initialisation via tracing-subscriber.
//!
//! Only the binary calls [`init`]. The library logs through `tracing`
//! macros and stays silent when no subscriber is installed.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ConfigResult, LOG_LEVELS};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; `level` (`"error"` .. `"trace"`) is the
/// fallback when it is unset or invalid. An unknown `level` is an error
/// either way.
pub fn init(level: &str) -> ConfigResult<()> {
    let fallback = parse_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(fallback.into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| ConfigError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Parse a log level string into a [`LevelFilter`]
pub fn parse_level(level: &str) -> ConfigResult<LevelFilter> {
    if !LOG_LEVELS.contains(&level) {
        return Err(ConfigError::Logger(format!(
            "unrecognised log level '{level}', expected one of {LOG_LEVELS:?}"
        )));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| ConfigError::Logger(format!("unrecognised log level: '{level}'")))
}
