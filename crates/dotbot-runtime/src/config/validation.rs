//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ChatterConfig, DotbotConfig, LogOutput, LoggingConfig, Site};

/// Validates the entire configuration.
pub fn validate_config(config: &DotbotConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_chatter_config(&config.chatter)?;
    Ok(())
}

/// Validates logging configuration.
fn validate_logging_config(config: &LoggingConfig) -> ConfigResult<()> {
    if config.output == LogOutput::File && config.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Validates chatter configuration.
fn validate_chatter_config(config: &ChatterConfig) -> ConfigResult<()> {
    let site = config.site()?;

    if config.channel.trim().is_empty() {
        return Err(ConfigError::missing_field("chatter.channel"));
    }
    if config.nick.trim().is_empty() {
        return Err(ConfigError::missing_field("chatter.nick"));
    }

    if let Some(url) = &config.url {
        validate_url(url)?;
    }

    if site == Site::Idns {
        if config.country.as_deref().is_none_or(|c| c.trim().is_empty()) {
            return Err(ConfigError::missing_field("chatter.country"));
        }
        if config.ping_interval_secs == Some(0) {
            return Err(ConfigError::validation(
                "IDNS ping interval must be greater than 0",
            ));
        }
    }

    Ok(())
}

/// Validates a WebSocket URL.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("chatter.url"));
    }

    let valid_schemes = ["ws://", "wss://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}
