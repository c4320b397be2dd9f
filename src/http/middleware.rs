//! Middleware pipeline stages.
//!
//! Each stage inspects the [`RequestContext`] and either lets the request
//! continue or short-circuits it. The dispatcher evaluates stages in the
//! order the route declares them; there is no `next` callback.

use std::sync::Arc;

use axum::response::Response;
use futures_util::future::{self, BoxFuture};

use crate::error::ApiError;
use crate::http::context::RequestContext;

/// What a stage decided.
pub enum Flow {
    /// Run the next stage (or the handler).
    Continue,
    /// Stop here and send this response.
    Halt(Response),
}

/// `Err` short-circuits with the error envelope.
pub type MiddlewareResult = Result<Flow, ApiError>;

pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs and in declarative route files.
    fn name(&self) -> &str;

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, MiddlewareResult>;
}

struct FnMiddleware<F> {
    name: String,
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> MiddlewareResult + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(future::ready((self.f)(ctx)))
    }
}

/// Build a synchronous stage from a closure.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Middleware>
where
    F: Fn(&mut RequestContext) -> MiddlewareResult + Send + Sync + 'static,
{
    Arc::new(FnMiddleware {
        name: name.into(),
        f,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::test_context;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_fn_middleware_runs_closure() {
        let require_json = from_fn("require_json", |ctx| {
            if ctx.header("content-type") == Some("application/json") {
                Ok(Flow::Continue)
            } else {
                Err(ApiError::validation("expected a JSON body").with_status(StatusCode::UNSUPPORTED_MEDIA_TYPE))
            }
        });
        assert_eq!(require_json.name(), "require_json");

        let mut ok = test_context(
            Request::builder()
                .header("content-type", "application/json")
                .body(())
                .unwrap(),
        );
        assert!(matches!(require_json.handle(&mut ok).await, Ok(Flow::Continue)));

        let mut bad = test_context(Request::builder().body(()).unwrap());
        let err = match require_json.handle(&mut bad).await {
            Err(err) => err,
            Ok(_) => panic!("expected rejection"),
        };
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
