//! Logging setup for hosts embedding the gateway.
//!
//! The library logs through the `log` facade. [`init_logging`] installs a
//! `tracing` subscriber and forwards `log` records into it.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{JobgateError, Result};

static INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn build_filter(default_filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| JobgateError::Telemetry(format!("invalid log filter '{}': {}", default_filter, e)))
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Returns `Ok(false)` if logging was already set up.
pub fn init_logging(default_filter: &str, format: LogFormat) -> Result<bool> {
    if INITIALIZED.get().is_some() {
        return Ok(false);
    }

    let filter = build_filter(default_filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match format {
        LogFormat::Pretty => Box::new(builder.finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        log::debug!("A global tracing subscriber is already installed");
        let _ = INITIALIZED.set(());
        return Ok(false);
    }
    tracing_log::LogTracer::init()
        .map_err(|e| JobgateError::Telemetry(format!("failed to bridge log records: {}", e)))?;

    let _ = INITIALIZED.set(());
    tracing::debug!(format = ?format, "Logging initialized");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_logging_is_idempotent() {
        let _ = init_logging("jobgate=debug", LogFormat::Pretty);
        assert!(!init_logging("jobgate=debug", LogFormat::Json).unwrap());
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
