//! Route tree compilation.
//!
//! # Responsibilities
//! - Walk a [`RouteGroup`] depth-first
//! - Join keys into absolute paths under the configured prefix
//! - Emit one [`CompiledBinding`] per leaf
//! - Reject duplicate (method, path) pairs
//! - Reject placeholder layouts the router cannot register
//!
//! # Design Decisions
//! - Repeated `/` are collapsed; a trailing `/` is kept
//! - Sibling order follows insertion order so logs are reproducible
//! - Duplicates are a startup error rather than first/last-write-wins

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::http::handler::Handler;
use crate::http::middleware::Middleware;
use crate::routing::router::axum_path;
use crate::routing::tree::{HttpMethod, RouteGroup, RouteNode};

/// A route ready for registration.
#[derive(Clone)]
pub struct CompiledBinding {
    pub method: HttpMethod,
    /// Absolute path, prefix included.
    pub path: String,
    pub middlewares: Vec<Arc<dyn Middleware>>,
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for CompiledBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledBinding")
            .field("method", &self.method)
            .field("path", &self.path)
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Flatten `tree` into bindings mounted under `prefix`.
pub fn compile(tree: &RouteGroup, prefix: &str) -> Result<Vec<CompiledBinding>, ConfigurationError> {
    let mut walker = Walker::default();
    walker.walk(tree, "", prefix)?;
    Ok(walker.bindings)
}

#[derive(Default)]
struct Walker {
    seen: HashSet<(HttpMethod, String)>,
    placeholders: Placeholders,
    bindings: Vec<CompiledBinding>,
}

impl Walker {
    fn walk(&mut self, group: &RouteGroup, base: &str, prefix: &str) -> Result<(), ConfigurationError> {
        for (key, node) in group.entries() {
            let path = join_path(base, key);
            match node {
                RouteNode::Group(child) => self.walk(child, &path, prefix)?,
                RouteNode::Leaf(leaf) => {
                    let full = normalize_path(&format!("{prefix}{path}"));
                    self.placeholders.check(&full)?;
                    if !self.seen.insert((leaf.method(), full.clone())) {
                        return Err(ConfigurationError::DuplicateRoute {
                            method: leaf.method(),
                            path: full,
                        });
                    }

                    tracing::debug!(
                        method = %leaf.method(),
                        path = %full,
                        middlewares = leaf.middlewares().len(),
                        "Route compiled"
                    );

                    self.bindings.push(CompiledBinding {
                        method: leaf.method(),
                        path: full,
                        middlewares: leaf.middlewares().to_vec(),
                        handler: leaf.handler().clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Placeholder seen at each position, keyed by the path shape leading to it.
///
/// The router keeps one placeholder per position, so `/posts/:id` and
/// `/posts/:slug` cannot both be registered.
#[derive(Default)]
struct Placeholders {
    slots: HashMap<String, (String, String)>,
}

impl Placeholders {
    fn check(&mut self, path: &str) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let translated = axum_path(path);
        let segments: Vec<&str> = translated.split('/').collect();
        let mut shape = String::new();

        for (i, segment) in segments.iter().enumerate() {
            let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                if segment.contains(['{', '}']) {
                    return Err(invalid("braces are only allowed around a whole segment"));
                }
                shape.push('/');
                shape.push_str(segment);
                continue;
            };

            let catch_all = inner.starts_with('*');
            let name = inner.trim_start_matches('*');
            if name.is_empty() {
                return Err(invalid("placeholder name is empty"));
            }
            if name.contains(['{', '}', '*', ':']) {
                return Err(invalid("placeholder name contains a reserved character"));
            }
            if catch_all && i + 1 != segments.len() {
                return Err(invalid("catch-all placeholder must be the last segment"));
            }

            match self.slots.get(&shape) {
                Some((token, existing)) if token.as_str() != *segment => {
                    return Err(ConfigurationError::ConflictingPlaceholder {
                        path: path.to_string(),
                        existing: existing.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.slots
                        .insert(shape.clone(), (segment.to_string(), path.to_string()));
                }
            }
            shape.push_str("/{}");
        }
        Ok(())
    }
}

/// Join a key onto a base path.
pub(crate) fn join_path(base: &str, key: &str) -> String {
    if key.is_empty() {
        return normalize_path(base);
    }
    normalize_path(&format!("{base}/{key}"))
}

/// Ensure a leading `/` and collapse runs of `/`.
pub fn normalize_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    out.push('/');
    for ch in raw.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::RequestContext;
    use crate::http::handler::HandlerResult;
    use crate::http::middleware::{from_fn, Flow};
    use crate::routing::tree::RouteLeaf;

    async fn noop(_ctx: RequestContext) -> HandlerResult {
        Ok(None)
    }

    fn summary(bindings: &[CompiledBinding]) -> Vec<(HttpMethod, &str)> {
        bindings.iter().map(|b| (b.method, b.path.as_str())).collect()
    }

    #[test]
    fn test_nested_tree_flattens_in_order() {
        let tree = RouteGroup::new()
            .route("health", RouteLeaf::get(noop))
            .route(
                "api",
                RouteGroup::new().route(
                    "v1",
                    RouteGroup::new().route("posts", RouteLeaf::get(noop)),
                ),
            );

        let bindings = compile(&tree, "").unwrap();
        assert_eq!(
            summary(&bindings),
            vec![(HttpMethod::Get, "/health"), (HttpMethod::Get, "/api/v1/posts")]
        );
    }

    #[test]
    fn test_leaf_without_method_is_post() {
        let tree = RouteGroup::new().route("login", RouteLeaf::new(noop));
        let bindings = compile(&tree, "").unwrap();
        assert_eq!(summary(&bindings), vec![(HttpMethod::Post, "/login")]);
    }

    #[test]
    fn test_prefix_and_separators_collapse() {
        let tree = RouteGroup::new().route(
            "/users/",
            RouteGroup::new()
                .route("//:id", RouteLeaf::get(noop))
                .route("", RouteLeaf::get(noop)),
        );

        let bindings = compile(&tree, "/api/").unwrap();
        assert_eq!(
            summary(&bindings),
            vec![(HttpMethod::Get, "/api/users/:id"), (HttpMethod::Get, "/api/users/")]
        );
    }

    #[test]
    fn test_prefix_without_leading_slash() {
        let tree = RouteGroup::new().route("ping", RouteLeaf::get(noop));
        let bindings = compile(&tree, "svc").unwrap();
        assert_eq!(bindings[0].path, "/svc/ping");
    }

    #[test]
    fn test_one_binding_per_leaf_and_middleware_order_kept() {
        let first = from_fn("first", |_| Ok(Flow::Continue));
        let second = from_fn("second", |_| Ok(Flow::Continue));
        let tree = RouteGroup::new().route(
            "posts",
            RouteGroup::new()
                .route(
                    "list",
                    RouteLeaf::get(noop).middleware(first).middleware(second),
                )
                .route("create", RouteLeaf::post(noop))
                .route("update", RouteLeaf::put(noop))
                .route("remove", RouteLeaf::delete(noop))
                .route("touch", RouteLeaf::patch(noop)),
        );

        let bindings = compile(&tree, "").unwrap();
        assert_eq!(bindings.len(), 5);
        let names: Vec<_> = bindings[0].middlewares.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_same_path_different_methods_allowed() {
        let tree = RouteGroup::new()
            .route("posts", RouteLeaf::get(noop))
            .route("/posts", RouteLeaf::post(noop));
        assert_eq!(compile(&tree, "").unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_binding_is_rejected() {
        let tree = RouteGroup::new()
            .route("api/posts", RouteLeaf::get(noop))
            .route("api", RouteGroup::new().route("posts", RouteLeaf::get(noop)));

        assert_eq!(
            compile(&tree, "").unwrap_err(),
            ConfigurationError::DuplicateRoute {
                method: HttpMethod::Get,
                path: "/api/posts".into(),
            }
        );
    }

    #[test]
    fn test_conflicting_placeholders_are_rejected() {
        let tree = RouteGroup::new().route(
            "posts",
            RouteGroup::new()
                .route(":id", RouteLeaf::get(noop))
                .route(":slug", RouteLeaf::post(noop)),
        );

        assert_eq!(
            compile(&tree, "").unwrap_err(),
            ConfigurationError::ConflictingPlaceholder {
                path: "/posts/:slug".into(),
                existing: "/posts/:id".into(),
            }
        );
    }

    #[test]
    fn test_shared_placeholder_and_literal_siblings_compile() {
        let tree = RouteGroup::new().route(
            "posts",
            RouteGroup::new()
                .route(":id", RouteLeaf::get(noop))
                .route(":id", RouteLeaf::put(noop))
                .route(":id/comments", RouteLeaf::get(noop))
                .route("new", RouteLeaf::get(noop)),
        );
        assert_eq!(compile(&tree, "").unwrap().len(), 4);
    }

    #[test]
    fn test_malformed_placeholders_are_rejected() {
        for key in [":", "*", "{}", "*rest/more", "a{b"] {
            let tree = RouteGroup::new().route("posts", RouteGroup::new().route(key, RouteLeaf::get(noop)));
            assert!(
                matches!(compile(&tree, ""), Err(ConfigurationError::InvalidPath { .. })),
                "{key}"
            );
        }
    }

    #[test]
    fn test_empty_tree_compiles_to_nothing() {
        assert!(compile(&RouteGroup::new(), "/api").unwrap().is_empty());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("a//b///c"), "/a/b/c");
        assert_eq!(normalize_path("/a/b/"), "/a/b/");
    }
}
