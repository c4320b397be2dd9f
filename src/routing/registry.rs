//! Named handlers and middlewares for declarative route trees.
//!
//! A declaration is plain data (a TOML table from the config file, or JSON):
//!
//! ```toml
//! [routes.health]
//! method = "get"
//! handler = "health"
//!
//! [routes.api.v1.posts]
//! method = "get"
//! handler = "list_posts"
//! middlewares = ["auth"]
//! ```
//!
//! A mapping carrying `handler` is a leaf; any other mapping is a group.
//! Everything else is rejected with the offending path.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ConfigurationError;
use crate::http::handler::Handler;
use crate::http::middleware::Middleware;
use crate::routing::compiler::join_path;
use crate::routing::tree::{HttpMethod, RouteGroup, RouteLeaf};

const LEAF_KEYS: [&str; 3] = ["method", "handler", "middlewares"];

#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn Handler>>,
    middlewares: HashMap<String, Arc<dyn Middleware>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(mut self, name: impl Into<String>, handler: impl Handler) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register a middleware under its own [`Middleware::name`].
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares
            .insert(middleware.name().to_string(), middleware);
        self
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn has_middleware(&self, name: &str) -> bool {
        self.middlewares.contains_key(name)
    }

    /// Resolve a JSON declaration into a route tree.
    pub fn resolve(&self, declaration: &Value) -> Result<RouteGroup, ConfigurationError> {
        match declaration {
            Value::Object(map) => self.group(map, ""),
            other => Err(ConfigurationError::InvalidNode {
                path: "/".into(),
                found: kind_of(other),
            }),
        }
    }

    /// Resolve the `routes` table of a config file.
    pub fn resolve_toml(&self, table: &toml::Table) -> Result<RouteGroup, ConfigurationError> {
        let declaration = serde_json::to_value(table)
            .map_err(|e| ConfigurationError::Declaration(e.to_string()))?;
        self.resolve(&declaration)
    }

    fn group(&self, map: &Map<String, Value>, base: &str) -> Result<RouteGroup, ConfigurationError> {
        let mut group = RouteGroup::new();
        for (key, value) in map {
            let path = join_path(base, key);
            match value {
                Value::Object(node) if node.contains_key("handler") => {
                    group.push(key.as_str(), self.leaf(node, &path)?);
                }
                Value::Object(node) => {
                    group.push(key.as_str(), self.group(node, &path)?);
                }
                other => {
                    return Err(ConfigurationError::InvalidNode {
                        path,
                        found: kind_of(other),
                    })
                }
            }
        }
        Ok(group)
    }

    fn leaf(&self, node: &Map<String, Value>, path: &str) -> Result<RouteLeaf, ConfigurationError> {
        if let Some(key) = node.keys().find(|k| !LEAF_KEYS.contains(&k.as_str())) {
            return Err(ConfigurationError::MixedNode {
                path: path.to_string(),
                key: key.clone(),
            });
        }

        let method = match node.get("method") {
            None | Some(Value::Null) => HttpMethod::default(),
            Some(Value::String(name)) => {
                name.parse::<HttpMethod>()
                    .map_err(|_| ConfigurationError::InvalidMethod {
                        path: path.to_string(),
                        method: name.clone(),
                    })?
            }
            Some(other) => {
                return Err(ConfigurationError::InvalidMethod {
                    path: path.to_string(),
                    method: other.to_string(),
                })
            }
        };

        let handler = match node.get("handler") {
            Some(Value::String(name)) => self.handlers.get(name).cloned().ok_or_else(|| {
                ConfigurationError::InvalidHandler {
                    path: path.to_string(),
                    reason: format!("no handler named `{name}` is registered"),
                }
            })?,
            other => {
                return Err(ConfigurationError::InvalidHandler {
                    path: path.to_string(),
                    reason: format!(
                        "expected a handler name, found {}",
                        other.map(kind_of).unwrap_or("nothing")
                    ),
                })
            }
        };

        let mut leaf = RouteLeaf::from_arc(method, handler);
        match node.get("middlewares") {
            None | Some(Value::Null) => {}
            Some(Value::Array(names)) => {
                for name in names {
                    let middleware = name
                        .as_str()
                        .and_then(|n| self.middlewares.get(n))
                        .cloned()
                        .ok_or_else(|| ConfigurationError::UnknownMiddleware {
                            path: path.to_string(),
                            name: name.as_str().map_or_else(|| name.to_string(), str::to_string),
                        })?;
                    leaf = leaf.middleware(middleware);
                }
            }
            Some(other) => {
                return Err(ConfigurationError::UnknownMiddleware {
                    path: path.to_string(),
                    name: other.to_string(),
                })
            }
        }

        Ok(leaf)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::RequestContext;
    use crate::http::handler::HandlerResult;
    use crate::http::middleware::{from_fn, Flow};
    use crate::routing::compile;
    use serde_json::json;

    async fn noop(_ctx: RequestContext) -> HandlerResult {
        Ok(None)
    }

    fn registry() -> Registry {
        Registry::new()
            .handler("health", noop)
            .handler("list_posts", noop)
            .middleware(from_fn("auth", |_| Ok(Flow::Continue)))
    }

    #[test]
    fn test_resolves_nested_declaration() {
        let declaration = json!({
            "health": { "method": "get", "handler": "health" },
            "api": { "v1": { "posts": {
                "method": "GET",
                "handler": "list_posts",
                "middlewares": ["auth"]
            } } }
        });

        let tree = registry().resolve(&declaration).unwrap();
        let bindings = compile(&tree, "").unwrap();
        let mut summary: Vec<_> = bindings
            .iter()
            .map(|b| (b.method, b.path.clone(), b.middlewares.len()))
            .collect();
        summary.sort();
        assert_eq!(
            summary,
            vec![
                (HttpMethod::Get, "/api/v1/posts".to_string(), 1),
                (HttpMethod::Get, "/health".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_missing_method_defaults_to_post() {
        let tree = registry()
            .resolve(&json!({ "login": { "handler": "health" } }))
            .unwrap();
        let bindings = compile(&tree, "").unwrap();
        assert_eq!(bindings[0].method, HttpMethod::Post);
    }

    #[test]
    fn test_rejects_unknown_method() {
        let err = registry()
            .resolve(&json!({ "health": { "method": "fetch", "handler": "health" } }))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidMethod {
                path: "/health".into(),
                method: "fetch".into()
            }
        );
    }

    #[test]
    fn test_rejects_uncallable_handler() {
        let unknown = registry()
            .resolve(&json!({ "a": { "b": { "handler": "missing" } } }))
            .unwrap_err();
        assert!(matches!(unknown, ConfigurationError::InvalidHandler { ref path, .. } if path == "/a/b"));

        let not_a_name = registry()
            .resolve(&json!({ "a": { "handler": 42 } }))
            .unwrap_err();
        assert!(matches!(not_a_name, ConfigurationError::InvalidHandler { .. }));
    }

    #[test]
    fn test_rejects_mixed_node() {
        let err = registry()
            .resolve(&json!({ "posts": {
                "handler": "list_posts",
                "comments": { "handler": "health" }
            } }))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MixedNode {
                path: "/posts".into(),
                key: "comments".into()
            }
        );
    }

    #[test]
    fn test_rejects_primitive_node() {
        let err = registry()
            .resolve(&json!({ "api": { "v1": "posts" } }))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidNode {
                path: "/api/v1".into(),
                found: "a string"
            }
        );

        assert!(registry().resolve(&json!(null)).is_err());
    }

    #[test]
    fn test_rejects_unknown_middleware() {
        let err = registry()
            .resolve(&json!({ "health": { "handler": "health", "middlewares": ["audit"] } }))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownMiddleware { ref name, .. } if name == "audit"));
    }

    #[test]
    fn test_resolves_toml_table() {
        let table: toml::Table = toml::from_str(
            r#"
            [health]
            method = "get"
            handler = "health"

            [api.v1.posts]
            method = "get"
            handler = "list_posts"
            middlewares = ["auth"]
            "#,
        )
        .unwrap();

        let tree = registry().resolve_toml(&table).unwrap();
        assert_eq!(compile(&tree, "/v").unwrap().len(), 2);
    }
}
