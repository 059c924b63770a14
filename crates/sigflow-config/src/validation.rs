//! Configuration validation
//!
//! Ensures configuration values are present and within valid ranges before a
//! client is built from them.

use crate::{ConfigError, ConfigResult, SigflowConfig, MAX_STOP_TIMEOUT_MS};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Required connection fields (realm, token)
/// - Stop timeout within `1..=2000` ms
/// - Positive collect deadline and default resolution
/// - Known log level
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &SigflowConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_value_ranges(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_required_fields(config: &SigflowConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.connection.realm.trim().is_empty() && config.connection.stream_url.is_none() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "connection.realm".to_string(),
        });
    }

    if config.connection.token.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "connection.token".to_string(),
        });
    }
}

fn validate_value_ranges(config: &SigflowConfig, errors: &mut Vec<ConfigValidationError>) {
    let timeout = config.computation.stop_timeout_ms;
    if timeout == 0 || timeout > MAX_STOP_TIMEOUT_MS {
        errors.push(ConfigValidationError::InvalidValue {
            field: "computation.stop_timeout_ms".to_string(),
            reason: format!("{} is outside 1..={}", timeout, MAX_STOP_TIMEOUT_MS),
        });
    }

    if config.computation.collect_deadline_ms == Some(0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "computation.collect_deadline_ms".to_string(),
            reason: "must be positive when set".to_string(),
        });
    }

    if config.computation.default_resolution_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "computation.default_resolution_ms".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        });
    }
}
