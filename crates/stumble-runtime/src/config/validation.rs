//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ExtensionsConfig, LogOutput, LoggingConfig, MumbleConfig, StumbleConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &StumbleConfig) -> ConfigResult<()> {
    validate_mumble_config(&config.mumble)?;
    if let Some(extensions) = &config.extensions {
        validate_extensions_config(extensions)?;
    }
    if let Some(operator) = config.operator()
        && operator.chars().any(char::is_whitespace)
    {
        return Err(ConfigError::validation(format!(
            "Operator cannot contain whitespace: {operator:?}"
        )));
    }
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_mumble_config(mumble: &MumbleConfig) -> ConfigResult<()> {
    if mumble.server.trim().is_empty() {
        return Err(ConfigError::missing_field("mumble.server"));
    }
    if mumble.username.trim().is_empty() {
        return Err(ConfigError::missing_field("mumble.username"));
    }
    if mumble.port == 0 {
        return Err(ConfigError::InvalidPort(mumble.port));
    }
    if mumble.ping_interval_secs == 0 {
        return Err(ConfigError::validation(
            "Ping interval must be greater than 0",
        ));
    }
    if mumble.connect_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "Connect timeout must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_extensions_config(extensions: &ExtensionsConfig) -> ConfigResult<()> {
    if let Some(name) = extensions.enabled.keys().find(|name| name.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Extension name cannot be empty: {name:?}"
        )));
    }
    if let Some(dir) = &extensions.config.directory
        && dir.as_os_str().is_empty()
    {
        return Err(ConfigError::validation(
            "extensions.config.directory cannot be empty",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}
