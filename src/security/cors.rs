//! Cross-origin resource sharing.
//!
//! `X-New-Access-Token` is always exposed so browser clients can pick up a
//! renewed access token.

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::auth::NEW_ACCESS_TOKEN_HEADER;
use crate::config::CorsConfig;
use crate::error::ConfigurationError;
use crate::http::request::X_REQUEST_ID;

pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, ConfigurationError> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| ConfigurationError::InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if config.allow_credentials && origins.is_empty() {
        return Err(ConfigurationError::InvalidOrigin("*".into()));
    }

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    let layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .expose_headers([
            HeaderName::from_static(NEW_ACCESS_TOKEN_HEADER),
            HeaderName::from_static(X_REQUEST_ID),
        ]);

    if config.allow_credentials {
        Ok(layer
            .allow_credentials(true)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
    } else {
        Ok(layer.allow_headers(Any))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_for_defaults_and_explicit_origins() {
        assert!(cors_layer(&CorsConfig::default()).is_ok());

        let config = CorsConfig {
            enabled: true,
            allowed_origins: vec!["https://app.example.com".into()],
            allow_credentials: true,
        };
        assert!(cors_layer(&config).is_ok());
    }

    #[test]
    fn test_credentials_with_any_origin_rejected() {
        let config = CorsConfig {
            allow_credentials: true,
            ..CorsConfig::default()
        };
        assert!(cors_layer(&config).is_err());
    }

    #[test]
    fn test_rejects_unencodable_origin() {
        let config = CorsConfig {
            allowed_origins: vec!["https://bad\norigin".into()],
            ..CorsConfig::default()
        };
        assert_eq!(
            cors_layer(&config).unwrap_err(),
            ConfigurationError::InvalidOrigin("https://bad\norigin".into())
        );
    }
}
