//! nestroute demo server.
//!
//! ```text
//!     config file + env ──▶ ServerConfig ──▶ TokenCodec ──▶ Authenticator
//!                                │                             │
//!                                ▼                             ▼
//!                     routes table (optional)        auth / authUserOnly /
//!                                │                    authServiceOnly
//!                                ▼                             │
//!                 Registry::resolve_toml  or  demo::routes  ◀──┘
//!                                │
//!                                ▼
//!                   compile ──▶ HttpServer ──▶ axum::serve
//! ```

mod demo;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use nestroute::auth::{Authenticator, RevocationList, TokenCodec, TokenKind};
use nestroute::config;
use nestroute::http::HttpServer;
use nestroute::lifecycle::{signals, Shutdown};
use nestroute::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "nestroute")]
#[command(about = "Serve a declarative route tree with token authentication", long_about = None)]
struct Args {
    /// TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "NESTROUTE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!("nestroute v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.bind_address(),
        prefix = %config.prefix,
        json_limit = %config.json_limit,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let codec = TokenCodec::from_config(&config.jwt)?;
    for kind in [TokenKind::Access, TokenKind::Refresh, TokenKind::Service] {
        if !codec.has_secret(kind) {
            tracing::warn!(kind = %kind, "Token secret not configured; this kind cannot be issued or verified");
        }
    }

    let revoked = RevocationList::new();
    let auth = Authenticator::new(codec).with_revocation(revoked.clone());
    let state = demo::DemoState::new(auth, revoked.clone());

    let routes = match &config.routes {
        Some(table) => demo::registry(&state).resolve_toml(table)?,
        None => demo::routes(&state),
    };

    let server = HttpServer::new(config.clone(), &routes)?;
    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let mut prune_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    revoked.prune_expired();
                }
                _ = prune_shutdown.recv() => break,
            }
        }
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_shutdown(&signal_shutdown).await;
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
