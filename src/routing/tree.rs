//! Route tree types.
//!
//! A tree is a [`RouteGroup`] of keyed entries, each either a nested group or
//! a terminal [`RouteLeaf`]. Trees are built once at startup and compiled
//! into flat bindings by [`crate::routing::compile`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::routing::MethodFilter;

use crate::error::ConfigurationError;
use crate::http::handler::Handler;
use crate::http::middleware::Middleware;
use crate::routing::registry::Registry;

/// Methods a leaf may bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    pub(crate) fn filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Patch => MethodFilter::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ConfigurationError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            "patch" => Ok(HttpMethod::Patch),
            _ => Err(ConfigurationError::UnknownMethod(s.to_string())),
        }
    }
}

/// A terminal route.
#[derive(Clone)]
pub struct RouteLeaf {
    method: HttpMethod,
    handler: Arc<dyn Handler>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl RouteLeaf {
    /// A POST route.
    pub fn new(handler: impl Handler) -> Self {
        Self::from_arc(HttpMethod::default(), Arc::new(handler))
    }

    pub fn from_arc(method: HttpMethod, handler: Arc<dyn Handler>) -> Self {
        Self {
            method,
            handler,
            middlewares: Vec::new(),
        }
    }

    pub fn get(handler: impl Handler) -> Self {
        Self::from_arc(HttpMethod::Get, Arc::new(handler))
    }

    pub fn post(handler: impl Handler) -> Self {
        Self::from_arc(HttpMethod::Post, Arc::new(handler))
    }

    pub fn put(handler: impl Handler) -> Self {
        Self::from_arc(HttpMethod::Put, Arc::new(handler))
    }

    pub fn delete(handler: impl Handler) -> Self {
        Self::from_arc(HttpMethod::Delete, Arc::new(handler))
    }

    pub fn patch(handler: impl Handler) -> Self {
        Self::from_arc(HttpMethod::Patch, Arc::new(handler))
    }

    /// Set the method from its name (case-insensitive).
    pub fn with_method(mut self, method: &str) -> Result<Self, ConfigurationError> {
        self.method = method.parse()?;
        Ok(self)
    }

    /// Append a stage to this route's pipeline.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }
}

impl fmt::Debug for RouteLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteLeaf")
            .field("method", &self.method)
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum RouteNode {
    Leaf(RouteLeaf),
    Group(RouteGroup),
}

impl From<RouteLeaf> for RouteNode {
    fn from(leaf: RouteLeaf) -> Self {
        RouteNode::Leaf(leaf)
    }
}

impl From<RouteGroup> for RouteNode {
    fn from(group: RouteGroup) -> Self {
        RouteNode::Group(group)
    }
}

/// Keyed children, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RouteGroup {
    entries: Vec<(String, RouteNode)>,
}

impl RouteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child under `key`. Keys may contain `/` and placeholder
    /// segments such as `:id`.
    pub fn route(mut self, key: impl Into<String>, node: impl Into<RouteNode>) -> Self {
        self.push(key, node);
        self
    }

    /// Build a group from a declarative tree, resolving names in `registry`.
    pub fn from_declaration(
        declaration: &serde_json::Value,
        registry: &Registry,
    ) -> Result<Self, ConfigurationError> {
        registry.resolve(declaration)
    }

    pub fn push(&mut self, key: impl Into<String>, node: impl Into<RouteNode>) {
        self.entries.push((key.into(), node.into()));
    }

    pub fn entries(&self) -> &[(String, RouteNode)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
