//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate units (durations, sizes) and value ranges
//! - Detect conflicting CORS settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::auth::token::MAX_TOKEN_LIFETIME;
use crate::config::schema::ServerConfig;
use crate::config::units::{parse_duration, parse_size};

/// One failed check, naming the offending key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.trim().is_empty() {
        errors.push(ValidationError::new("host", "must not be empty"));
    }

    if config.prefix.contains(char::is_whitespace) {
        errors.push(ValidationError::new("prefix", "must not contain whitespace"));
    }

    if let Err(e) = parse_size(&config.json_limit) {
        errors.push(ValidationError::new("json_limit", e.to_string()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    for (field, raw) in [
        ("jwt.expiration", &config.jwt.expiration),
        ("jwt.refresh_expiration", &config.jwt.refresh_expiration),
    ] {
        match parse_duration(raw) {
            Ok(d) if d.is_zero() => errors.push(ValidationError::new(field, "must be greater than 0")),
            Ok(d) if d > MAX_TOKEN_LIFETIME => errors.push(ValidationError::new(
                field,
                format!("must not exceed {}d", MAX_TOKEN_LIFETIME.as_secs() / 86_400),
            )),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(field, e.to_string())),
        }
    }

    let cors = &config.cors;
    if cors.enabled {
        if cors.allow_credentials && cors.allowed_origins.is_empty() {
            errors.push(ValidationError::new(
                "cors.allow_credentials",
                "requires explicit cors.allowed_origins",
            ));
        }
        for origin in &cors.allowed_origins {
            if origin == "*" || HeaderValue::from_str(origin).is_err() {
                errors.push(ValidationError::new(
                    "cors.allowed_origins",
                    format!("invalid origin `{origin}`"),
                ));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    let jwt = &config.jwt;
    let secrets = [&jwt.secret, &jwt.refresh_secret, &jwt.service_secret];
    let configured: Vec<&String> = secrets.iter().filter_map(|s| s.as_ref()).collect();
    for (i, a) in configured.iter().enumerate() {
        if configured[i + 1..].contains(a) {
            tracing::warn!("Two token kinds share a secret; only the type claim tells them apart");
            break;
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
