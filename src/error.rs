//! Error taxonomy.
//!
//! - [`ConfigurationError`]: structural problems found while building the
//!   server (route shapes, methods, secrets, units). Fatal to startup.
//! - [`ApiError`]: per-request failures. Carries an HTTP status, a message,
//!   the offending input field when known, and arbitrary extra fields that
//!   end up in the error envelope.

use axum::http::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::TokenKind;
use crate::routing::HttpMethod;

/// Structural/configuration errors surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unsupported HTTP method `{0}` (expected one of get, post, put, delete, patch)")]
    UnknownMethod(String),

    #[error("route `{path}`: unsupported HTTP method `{method}`")]
    InvalidMethod { path: String, method: String },

    #[error("route `{path}`: handler is not callable ({reason})")]
    InvalidHandler { path: String, reason: String },

    #[error("route `{path}`: unknown middleware `{name}`")]
    UnknownMiddleware { path: String, name: String },

    #[error("route `{path}` declares a handler and a nested key `{key}`")]
    MixedNode { path: String, key: String },

    #[error("route `{path}`: expected a route group or a leaf, found {found}")]
    InvalidNode { path: String, found: &'static str },

    #[error("duplicate route {method} {path}")]
    DuplicateRoute { method: HttpMethod, path: String },

    #[error("route `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("route `{path}` uses a different placeholder than `{existing}` at the same position")]
    ConflictingPlaceholder { path: String, existing: String },

    #[error("{0} token secret is not configured")]
    MissingSecret(TokenKind),

    #[error("invalid duration `{0}` (expected e.g. 30s, 15m, 12h, 7d)")]
    InvalidDuration(String),

    #[error("invalid size `{0}` (expected e.g. 512kb, 1mb)")]
    InvalidSize(String),

    #[error("invalid CORS origin `{0}`")]
    InvalidOrigin(String),

    #[error("route declaration could not be read: {0}")]
    Declaration(String),
}

/// A request-scoped failure rendered through the error envelope.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
    field: Option<String>,
    extra: Map<String, Value>,
}

impl ApiError {
    /// A generic application error. Defaults to 400.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            field: None,
            extra: Map::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::NOT_FOUND)
    }

    pub fn payload_too_large() -> Self {
        Self::new("Request body exceeds the configured limit")
            .with_status(StatusCode::PAYLOAD_TOO_LARGE)
    }

    /// Misconfiguration detected while serving a request.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Anything unexpected. Always 500.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Name the input field that failed validation.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach an additional field to the error envelope.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(err: ConfigurationError) -> Self {
        ApiError::configuration(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation(format!("Invalid JSON body: {err}"))
    }
}
