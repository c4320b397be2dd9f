//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower-http layers)
//!     → request.rs (request ID)
//!     → dispatcher.rs (one per compiled binding)
//!         → middleware.rs (pipeline stages, e.g. the auth cascade)
//!         → handler.rs (route handler, gets a context.rs RequestContext)
//!     → response.rs (success / error envelope)
//!     → Send to client
//! ```

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use context::{RequestContext, ResponseHandle};
pub use handler::{reply, Handler, HandlerResult};
pub use middleware::{from_fn, Flow, Middleware, MiddlewareResult};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
