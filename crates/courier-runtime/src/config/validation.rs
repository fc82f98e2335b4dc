//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File {
        match &logging.file_path {
            None => {
                return Err(ConfigError::validation(
                    "logging.file_path is required when logging.output is `file`",
                ));
            }
            Some(path) if path.file_name().is_none() => {
                return Err(ConfigError::validation(format!(
                    "logging.file_path must name a file: {}",
                    path.display()
                )));
            }
            Some(_) => {}
        }
    }

    if let Some(target) = logging.filters.keys().find(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "logging.filters contains an empty target: {target:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.logging.file_path = Some(PathBuf::from("logs/courier.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_filter_target_is_rejected() {
        let mut config = CourierConfig::default();
        config.logging.filters.insert(" ".to_string(), LogLevel::Debug);
        assert!(validate_config(&config).is_err());
    }
}
