// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Accepted values for `log.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.engine.mailbox_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.mailbox_capacity must be at least 1".to_string(),
        });
    }

    if config.engine.max_content_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.max_content_bytes must be at least 1".to_string(),
        });
    }

    if config.engine.max_pending_frames == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.max_pending_frames must be at least 1".to_string(),
        });
    }

    let level = config.log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = CourierConfig::default();
        config.gateway.host = "  ".into();
        config.engine.mailbox_capacity = 0;
        config.engine.max_content_bytes = 0;
        config.engine.max_pending_frames = 0;
        config.log.level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().any(|e| e.to_string().contains("engine.max_pending_frames")));
    }

    #[test]
    fn rejects_host_with_spaces() {
        let mut config = CourierConfig::default();
        config.gateway.host = "not a host".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("not a valid IP address or hostname"));
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = CourierConfig::default();
        config.log.level = "DEBUG".into();
        assert!(validate_config(&config).is_ok());
    }
}
