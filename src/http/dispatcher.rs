//! Per-binding request dispatch.
//!
//! # Responsibilities
//! - Buffer the body and build the [`RequestContext`]
//! - Run the binding's middleware pipeline in declared order
//! - Invoke the handler and decide whether to auto-send a response
//! - Catch handler failures (errors and panics) at this boundary
//!
//! # Design Decisions
//! - A response sent through the context always wins; it is sent once
//! - Queued headers/cookies are applied to every outgoing response,
//!   including rejections (e.g. a cleared refresh cookie on a 401)

use std::collections::HashMap;
use std::error::Error as StdError;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRequestParts, Path, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use http_body_util::LengthLimitError;

use crate::error::ApiError;
use crate::http::context::{RequestContext, ResponseHandle};
use crate::http::handler::HandlerResult;
use crate::http::middleware::Flow;
use crate::http::response;
use crate::observability::metrics;
use crate::routing::CompiledBinding;

enum Outcome {
    Halted(Response),
    Completed(HandlerResult),
}

/// Serve one request for `binding`, buffering at most `body_limit` bytes.
pub async fn dispatch(binding: Arc<CompiledBinding>, request: Request, body_limit: usize) -> Response {
    let start_time = Instant::now();
    let (mut parts, body) = request.into_parts();

    let params = match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await {
        Ok(Path(params)) => params,
        Err(_) => HashMap::new(),
    };

    let body = match axum::body::to_bytes(body, body_limit).await {
        Ok(bytes) => bytes,
        Err(e) if exceeds_limit(&e) => {
            tracing::debug!(path = %binding.path, limit = body_limit, "Request body too large");
            return response::error(&ApiError::payload_too_large());
        }
        Err(e) => {
            tracing::debug!(path = %binding.path, error = %e, "Failed to read request body");
            return response::error(&ApiError::validation("Failed to read request body"));
        }
    };

    let handle = ResponseHandle::from_request_headers(&parts.headers);
    let ctx = RequestContext::new(parts, body, params, handle.clone());

    let outcome = AssertUnwindSafe(run(&binding, ctx)).catch_unwind().await;

    let response = match outcome {
        Ok(Outcome::Halted(halt)) => handle.take_sent().unwrap_or(halt),
        Ok(Outcome::Completed(result)) => match (handle.take_sent(), result) {
            (Some(sent), Ok(_)) => sent,
            (Some(sent), Err(err)) => {
                tracing::warn!(
                    method = %binding.method,
                    path = %binding.path,
                    error = %err,
                    "Handler failed after sending a response"
                );
                sent
            }
            (None, Ok(Some(body))) => response::success(body, StatusCode::OK),
            (None, Ok(None)) => StatusCode::NO_CONTENT.into_response(),
            (None, Err(err)) => response::error(&err),
        },
        Err(_) => {
            tracing::error!(
                method = %binding.method,
                path = %binding.path,
                "Handler panicked"
            );
            response::error(&ApiError::internal("Internal server error"))
        }
    };

    let response = handle.decorate(response);
    metrics::record_request(
        binding.method.as_str(),
        &binding.path,
        response.status().as_u16(),
        start_time,
    );
    response
}

/// The limit may be hit here or by an outer `RequestBodyLimitLayer`.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

async fn run(binding: &CompiledBinding, mut ctx: RequestContext) -> Outcome {
    for middleware in &binding.middlewares {
        match middleware.handle(&mut ctx).await {
            Ok(Flow::Continue) if ctx.is_sent() => return Outcome::Completed(Ok(None)),
            Ok(Flow::Continue) => {}
            Ok(Flow::Halt(response)) => return Outcome::Halted(response),
            Err(err) => {
                tracing::debug!(
                    middleware = middleware.name(),
                    path = %binding.path,
                    status = err.status().as_u16(),
                    error = %err,
                    "Request rejected by middleware"
                );
                return Outcome::Completed(Err(err));
            }
        }
    }

    Outcome::Completed(binding.handler.call(ctx).await)
}
