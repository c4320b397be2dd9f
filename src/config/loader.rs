//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("environment variable {var} has invalid value `{value}`")]
    InvalidEnv { var: &'static str, value: String },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: file (if any), then environment, then validation.
pub fn load(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file, ignoring the environment.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PORT` and `JWT_*` overrides read through `lookup`.
pub fn apply_env_overrides(
    config: &mut ServerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(port) = lookup("PORT") {
        config.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: "PORT",
            value: port.clone(),
        })?;
    }

    let jwt = &mut config.jwt;
    for (var, slot) in [
        ("JWT_SECRET", &mut jwt.secret),
        ("JWT_REFRESH", &mut jwt.refresh_secret),
        ("JWT_SERVICE", &mut jwt.service_secret),
    ] {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }

    if let Some(value) = lookup("JWT_EXPIRATION") {
        jwt.expiration = value;
    }
    if let Some(value) = lookup("JWT_REFRESH_EXPIRATION") {
        jwt.refresh_expiration = value;
    }

    Ok(())
}
