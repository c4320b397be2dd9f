//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile the route tree and register it on an Axum Router
//! - Wire up middleware (body limit, timeout, security headers, CORS,
//!   tracing, request ID, panic catching)
//! - Serve on a listener until shutdown is signalled

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::units::parse_size;
use crate::config::ServerConfig;
use crate::error::ConfigurationError;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response;
use crate::routing::{compile, into_router, CompiledBinding, RouteGroup};
use crate::security::{cors_layer, headers};

/// HTTP server for a compiled route tree.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Compile `routes` under `config.prefix` and build the router.
    pub fn new(config: ServerConfig, routes: &RouteGroup) -> Result<Self, ConfigurationError> {
        let bindings = compile(routes, &config.prefix)?;
        Self::from_bindings(config, bindings)
    }

    pub fn from_bindings(
        config: ServerConfig,
        bindings: Vec<CompiledBinding>,
    ) -> Result<Self, ConfigurationError> {
        for binding in &bindings {
            tracing::info!(
                method = %binding.method,
                path = %binding.path,
                middlewares = ?binding.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
                "Route registered"
            );
        }
        tracing::info!(routes = bindings.len(), prefix = %config.prefix, "Route tree compiled");

        let router = Self::build_router(&config, bindings)?;
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ServerConfig,
        bindings: Vec<CompiledBinding>,
    ) -> Result<Router, ConfigurationError> {
        let body_limit = parse_size(&config.json_limit)?;

        let mut router = into_router(bindings, body_limit)
            .fallback(response::not_found)
            .method_not_allowed_fallback(response::method_not_allowed)
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        if config.security.enable_headers {
            router = headers::apply(router);
        }
        if config.cors.enabled {
            router = router.layer(cors_layer(&config.cors)?);
        }
        if config.enable_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        Ok(router
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(CatchPanicLayer::custom(response::panic_response)))
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
