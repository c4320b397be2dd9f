//! Response envelope formatting.
//!
//! # Wire format
//! - Success: the handler's JSON, verbatim
//! - Error: `{"error": {"message": ..., "field"?: ..., ...extra}}`
//!
//! # Design Decisions
//! - 5xx errors are logged at error level, everything else at debug
//! - Router fallbacks and caught panics use the same error envelope

use std::any::Any;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Send `data` as the body with `status`.
pub fn success(data: Value, status: StatusCode) -> Response {
    (status, Json(data)).into_response()
}

/// The error envelope body for `err`.
pub fn error_body(err: &ApiError) -> Value {
    let mut inner = Map::new();
    for (key, value) in err.extra() {
        inner.insert(key.clone(), value.clone());
    }
    inner.insert("message".into(), Value::from(err.message()));
    if let Some(field) = err.field() {
        inner.insert("field".into(), Value::from(field));
    }

    let mut envelope = Map::new();
    envelope.insert("error".into(), Value::Object(inner));
    Value::Object(envelope)
}

/// Render `err` through the error envelope.
pub fn error(err: &ApiError) -> Response {
    if err.status().is_server_error() {
        tracing::error!(status = err.status().as_u16(), error = %err, "Request failed");
    } else {
        tracing::debug!(status = err.status().as_u16(), error = %err, "Request rejected");
    }
    (err.status(), Json(error_body(err))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error(&self)
    }
}

/// Router fallback for unmatched paths.
pub async fn not_found() -> Response {
    error(&ApiError::not_found("Route not found"))
}

/// Router fallback for a known path with an unbound method.
pub async fn method_not_allowed() -> Response {
    error(&ApiError::new("Method not allowed").with_status(StatusCode::METHOD_NOT_ALLOWED))
}

/// Panic handler for `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Panic escaped request handling");

    let body = error_body(&ApiError::internal("Internal server error")).to_string();
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
