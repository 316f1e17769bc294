//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatekeeperConfig, ConfigError> {
    let config: GatekeeperConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("gatekeeper-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "[rate_limit]\nlimit = 20\nwindow_ms = 1000\n\n[upstream]\naddress = \"10.0.0.5:8000\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.rate_limit.limit, 20);
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert_eq!(config.upstream.address, "10.0.0.5:8000");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = parse_config("[rate_limit\nlimit = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_semantic_errors_are_joined() {
        let err = parse_config("[rate_limit]\nlimit = 0\nwindow_ms = 0\n").unwrap_err();
        match &err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            err.to_string(),
            "Validation failed: rate_limit: rate limit must be at least 1, rate_limit: rate limit window must be at least 1ms"
        );
    }
}
