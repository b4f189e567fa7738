use std::path::Path;

use crate::approval::MAX_EXPIRATION_SECS;
use crate::config::schema::GatewayConfig;
use crate::error::ConfigError;

/// Loads a config file; `.yaml`/`.yml` files are read as YAML, anything else as JSON.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        load_config_from_yaml_str(&content)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config_from_yaml_str(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), ConfigError> {
    let base_url = config.backend.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(invalid(format!(
            "backend.base_url must start with http:// or https://, got '{}'",
            config.backend.base_url
        )));
    }
    if config.backend.request_timeout_secs == 0 {
        return Err(invalid("backend.request_timeout_secs must be greater than 0"));
    }
    if config.backend.connect_timeout_secs == 0 {
        return Err(invalid("backend.connect_timeout_secs must be greater than 0"));
    }

    if config.poll.interval_secs == 0 {
        return Err(invalid("poll.interval_secs must be greater than 0"));
    }

    if !config.approvals.expiration.is_valid() {
        return Err(invalid(format!(
            "approvals.expiration must be \"never\" or between 1 and {} seconds",
            MAX_EXPIRATION_SECS
        )));
    }
    // Expiry must be checked at least once per second.
    if !(1..=1000).contains(&config.approvals.tick_interval_ms) {
        return Err(invalid(format!(
            "approvals.tick_interval_ms must be between 1 and 1000, got {}",
            config.approvals.tick_interval_ms
        )));
    }

    if config.page_size == 0 {
        return Err(invalid("page_size must be greater than 0"));
    }
    if config.event_capacity == 0 {
        return Err(invalid("event_capacity must be greater than 0"));
    }

    Ok(())
}
