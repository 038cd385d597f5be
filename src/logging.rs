//! Log output setup for binaries built on this crate
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. [`init`] is the one used by the demo binary.

use tracing_subscriber::EnvFilter;

use crate::error::{PlcError, PlcResult};

/// Default filter directive when neither `RUST_LOG` nor a level is given.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the filter: `RUST_LOG` when set, otherwise `level`.
pub fn env_filter(level: &str) -> PlcResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| PlcError::configuration(format!("Invalid log level '{}': {}", level, e))),
    }
}

/// Install a formatted stdout subscriber.
///
/// Fails if the level is not a valid filter directive or a global
/// subscriber is already installed.
pub fn init(level: &str) -> PlcResult<()> {
    let filter = env_filter(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| PlcError::configuration(format!("Logging already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_levels() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(env_filter("debug").is_ok());
        assert!(env_filter("voltage_s7=trace,info").is_ok());
        assert!(env_filter("voltage_s7=loud").is_err());
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init(DEFAULT_LOG_LEVEL);
        assert!(init(DEFAULT_LOG_LEVEL).is_err());
    }
}
