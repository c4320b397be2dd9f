//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};
use nestroute::auth::token::Claims;
use nestroute::auth::{TokenCodec, TokenKind};
use nestroute::config::ServerConfig;
use nestroute::http::HttpServer;
use nestroute::lifecycle::Shutdown;
use nestroute::RouteGroup;
use serde_json::Map;
use tokio::net::TcpListener;

pub const ACCESS_SECRET: &str = "test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret";
pub const SERVICE_SECRET: &str = "test-service-secret";

/// A server running on an ephemeral port. Stops when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        enable_logging: false,
        ..ServerConfig::default()
    }
}

/// Compile `routes` with `config` and serve them.
pub async fn spawn_server(config: ServerConfig, routes: &RouteGroup) -> TestServer {
    let server = HttpServer::new(config, routes).expect("routes compile");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestServer {
        addr,
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap(),
        shutdown,
    }
}

/// A codec with all three secrets.
pub fn codec() -> TokenCodec {
    TokenCodec::new(Duration::from_secs(900), Duration::from_secs(86_400))
        .with_secret(TokenKind::Access, ACCESS_SECRET)
        .with_secret(TokenKind::Refresh, REFRESH_SECRET)
        .with_secret(TokenKind::Service, SERVICE_SECRET)
}

/// An access token for `subject` that expired a minute ago.
pub fn expired_access_token(subject: &str) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: subject.into(),
        kind: TokenKind::Access,
        iat: now - 3_600,
        exp: now - 60,
        extra: Map::new(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .unwrap()
}
