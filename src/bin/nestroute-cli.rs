use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};

use nestroute::auth::{TokenCodec, TokenKind};
use nestroute::config;

#[derive(Parser)]
#[command(name = "nestroute-cli")]
#[command(about = "Token tooling and health probe for nestroute", long_about = None)]
struct Cli {
    /// Config file to read secrets and lifetimes from (JWT_* env vars also apply).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue or verify tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Check that a server answers on its health route
    Health {
        #[arg(short, long, default_value = "http://localhost:3000/health")]
        url: String,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Sign a new token
    Issue {
        #[arg(short, long, value_enum)]
        kind: Kind,
        /// User id, or service name for service tokens
        #[arg(short, long)]
        subject: String,
        /// Extra claim as key=value (repeatable)
        #[arg(long = "claim", value_parser = parse_claim)]
        claims: Vec<(String, Value)>,
        /// Secret to sign with, instead of the configured one
        #[arg(long)]
        secret: Option<String>,
    },
    /// Verify a token and print its claims
    Verify {
        #[arg(short, long, value_enum)]
        kind: Kind,
        token: String,
        #[arg(long)]
        secret: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Access,
    Refresh,
    Service,
}

impl From<Kind> for TokenKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Access => TokenKind::Access,
            Kind::Refresh => TokenKind::Refresh,
            Kind::Service => TokenKind::Service,
        }
    }
}

/// `key=value`; the value is parsed as JSON when possible, else kept as a string.
fn parse_claim(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}

fn codec(
    config: Option<&Path>,
    kind: TokenKind,
    secret: Option<&str>,
) -> Result<TokenCodec, Box<dyn std::error::Error>> {
    let config = config::load(config)?;
    let codec = TokenCodec::from_config(&config.jwt)?;
    Ok(match secret {
        Some(secret) => codec.with_secret(kind, secret),
        None => codec,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token { command } => match command {
            TokenCommands::Issue { kind, subject, claims, secret } => {
                let kind = TokenKind::from(kind);
                let codec = codec(cli.config.as_deref(), kind, secret.as_deref())?;
                let extra: Map<String, Value> = claims.into_iter().collect();
                let token = codec.issue(kind, &subject, extra)?;
                println!("{token}");
            }
            TokenCommands::Verify { kind, token, secret } => {
                let kind = TokenKind::from(kind);
                let codec = codec(cli.config.as_deref(), kind, secret.as_deref())?;
                match codec.verify_kind(&token, kind) {
                    Some(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
                    None => {
                        eprintln!("Error: token is not a valid {kind} token");
                        std::process::exit(1);
                    }
                }
            }
        },
        Commands::Health { url } => {
            let res = reqwest::get(&url).await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: {url} returned status {status}");
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {text}");
                }
                std::process::exit(1);
            }

            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
