//! Registration of compiled bindings on an axum [`Router`].
//!
//! # Design Decisions
//! - Bindings sharing a path are merged into one method router
//! - `:name` and `*name` segments are rewritten to axum's `{name}` /
//!   `{*name}`; matching itself is left to axum

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Request;
use axum::routing::{on, MethodRouter};
use axum::Router;

use crate::http::dispatcher::dispatch;
use crate::routing::compiler::CompiledBinding;

/// Build a router serving every binding through the dispatcher.
///
/// Request bodies larger than `body_limit` bytes are answered with 413.
pub fn into_router(bindings: Vec<CompiledBinding>, body_limit: usize) -> Router {
    let mut order: Vec<String> = Vec::new();
    let mut by_path: HashMap<String, MethodRouter> = HashMap::new();

    for binding in bindings {
        let path = axum_path(&binding.path);
        let filter = binding.method.filter();
        let binding = Arc::new(binding);
        let handler = move |request: Request| dispatch(binding.clone(), request, body_limit);

        let method_router = match by_path.remove(&path) {
            Some(existing) => existing.on(filter, handler),
            None => {
                order.push(path.clone());
                on(filter, handler)
            }
        };
        by_path.insert(path, method_router);
    }

    order.into_iter().fold(Router::new(), |router, path| {
        match by_path.remove(&path) {
            Some(method_router) => router.route(&path, method_router),
            None => router,
        }
    })
}

/// Translate placeholder segments into axum syntax.
pub fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::RequestContext;
    use crate::http::handler::HandlerResult;
    use crate::routing::{compile, RouteGroup, RouteLeaf};
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    async fn show(ctx: RequestContext) -> HandlerResult {
        Ok(Some(json!({ "id": ctx.param("id") })))
    }

    async fn create(_ctx: RequestContext) -> HandlerResult {
        Ok(Some(json!({ "created": true })))
    }

    #[test]
    fn test_axum_path_rewrites_placeholders() {
        assert_eq!(axum_path("/posts/:id"), "/posts/{id}");
        assert_eq!(axum_path("/files/*rest"), "/files/{*rest}");
        assert_eq!(axum_path("/posts/{id}/comments"), "/posts/{id}/comments");
        assert_eq!(axum_path("/"), "/");
    }

    #[tokio::test]
    async fn test_routes_merge_methods_and_expose_params() {
        let tree = RouteGroup::new().route(
            "posts",
            RouteGroup::new()
                .route(":id", RouteLeaf::get(show))
                .route(":id", RouteLeaf::put(create)),
        );
        let router = into_router(compile(&tree, "").unwrap(), 1 << 20);

        let res = router
            .clone()
            .oneshot(HttpRequest::get("/posts/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "id": "42" }));

        let res = router
            .oneshot(HttpRequest::put("/posts/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
