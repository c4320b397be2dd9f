//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has a `Default`, so a minimal file (or none) is valid.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind. Overridden by `PORT`.
    pub port: u16,

    /// Prefix prepended to every compiled route (e.g. "/api").
    pub prefix: String,

    /// Emit a tracing span per request.
    pub enable_logging: bool,

    /// Maximum request body size (e.g. "1mb").
    pub json_limit: String,

    pub cors: CorsConfig,

    pub security: SecurityConfig,

    pub timeouts: TimeoutConfig,

    /// Token secrets and lifetimes.
    pub jwt: JwtConfig,

    pub observability: ObservabilityConfig,

    /// Declarative route tree, resolved against a registry at startup.
    pub routes: Option<toml::Table>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            prefix: String::new(),
            enable_logging: true,
            json_limit: "1mb".to_string(),
            cors: CorsConfig::default(),
            security: SecurityConfig::default(),
            timeouts: TimeoutConfig::default(),
            jwt: JwtConfig::default(),
            observability: ObservabilityConfig::default(),
            routes: None,
        }
    }
}

impl ServerConfig {
    /// `host:port`, ready for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Cross-origin settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,

    /// Allowed origins. Empty means any origin.
    pub allowed_origins: Vec<String>,

    /// Allow cookies and auth headers on cross-origin requests.
    /// Requires explicit origins.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            allow_credentials: false,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Token settings. A kind without a secret cannot be issued or verified.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Access token secret (`JWT_SECRET`).
    pub secret: Option<String>,

    /// Refresh token secret (`JWT_REFRESH`).
    pub refresh_secret: Option<String>,

    /// Service token secret (`JWT_SERVICE`).
    pub service_secret: Option<String>,

    /// Access and service token lifetime (`JWT_EXPIRATION`).
    pub expiration: String,

    /// Refresh token lifetime (`JWT_REFRESH_EXPIRATION`).
    pub refresh_expiration: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            refresh_secret: None,
            service_secret: None,
            expiration: "15m".to_string(),
            refresh_expiration: "7d".to_string(),
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("JwtConfig")
            .field("secret", &redact(&self.secret))
            .field("refresh_secret", &redact(&self.refresh_secret))
            .field("service_secret", &redact(&self.service_secret))
            .field("expiration", &self.expiration)
            .field("refresh_expiration", &self.refresh_expiration)
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
