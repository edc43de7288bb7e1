//! Logging initialization.
//!
//! The pipeline emits structured events through `tracing`; embedding tools
//! that don't install their own subscriber can call [`init_logging`] for a
//! sensible default: stdout output, filtered by `RUST_LOG` (defaulting to
//! `info`).

use tracing_subscriber::EnvFilter;

/// Installs the default global subscriber.
///
/// Errors if a global subscriber is already set.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
}
