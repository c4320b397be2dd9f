//! Route handlers.

use std::future::Future;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::context::RequestContext;

/// `Some(body)` is sent as the success envelope. `None` means the handler
/// already sent its own response (or has nothing to say: 204).
pub type HandlerResult = Result<Option<Value>, ApiError>;

/// An async route handler.
///
/// Implemented for every `Fn(RequestContext) -> impl Future<Output = HandlerResult>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(ctx))
    }
}

/// Serialize `data` as a success body.
pub fn reply<T: Serialize>(data: T) -> HandlerResult {
    serde_json::to_value(data)
        .map(Some)
        .map_err(|e| ApiError::internal(format!("failed to serialize response: {e}")))
}
