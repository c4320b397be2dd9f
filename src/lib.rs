//! Declarative route trees compiled onto axum, with a service / access /
//! refresh token auth cascade.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use auth::{AuthContext, Authenticator, TokenCodec, TokenKind};
pub use config::ServerConfig;
pub use error::{ApiError, ConfigurationError};
pub use http::{HttpServer, RequestContext};
pub use lifecycle::Shutdown;
pub use routing::{Registry, RouteGroup, RouteLeaf};
