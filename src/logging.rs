//! Log subscriber installation.
//!
//! Library code only emits `tracing` events; nothing is printed until a
//! subscriber is installed. Embedders that already run their own subscriber
//! should skip [`init_logging`].

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigError, LogFormat, LoggingConfig};

/// Installs a global `fmt` subscriber filtered by `config.filter`.
///
/// Returns `Ok(true)` if this call installed the subscriber and `Ok(false)`
/// if a global subscriber was already set, in which case nothing changes.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the filter directives are invalid.
///
/// # Examples
///
/// ```
/// use nc4async::config::LoggingConfig;
/// use nc4async::logging::init_logging;
///
/// let config = LoggingConfig::default();
/// let first = init_logging(&config).unwrap();
/// assert!(!init_logging(&config).unwrap());
/// # let _ = first;
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ConfigError::Parse(format!("invalid log filter \"{}\": {e}", config.filter)))?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    Ok(installed.is_ok())
}
