//! Observability infrastructure: tracing initialization.
//!
//! Both binaries call [`init`] once at startup before any other operation.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{PulseError, Result};

/// Initialize the global tracing subscriber.
///
/// `level` is the minimal level to emit ("error", "warn", "info", "debug",
/// "trace"); `RUST_LOG` still takes precedence when set so individual targets
/// can be tuned without a config change.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| PulseError::InvalidConfig { reason: format!("bad log level {level:?}: {e}") })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .try_init()
        .map_err(|e| PulseError::InvalidConfig { reason: format!("tracing init failed: {e}") })?;

    Ok(())
}
