//! MCP OAuth Bridge - Entry Point
//!
//! Binds the authorization broker against the chosen upstream provider.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_oauth_bridge::config::{Config, ProviderKind};
use mcp_oauth_bridge::server::BrokerServer;

#[derive(Parser, Debug)]
#[command(name = "mcp-oauth-bridge")]
#[command(about = "OAuth 2.0 broker bridging MCP clients to upstream login")]
#[command(version)]
struct Cli {
    /// Upstream identity provider
    #[arg(long, default_value = "auth0", env = "UPSTREAM_PROVIDER")]
    provider: Provider,

    /// HTTP server port
    #[arg(long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Public base URL of the broker (the upstream redirect target is {base-url}/callback)
    #[arg(long, default_value = "http://localhost:3000", env = "BASE_URL")]
    base_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Provider {
    /// Auth0 tenant (OIDC; supports refresh and JWKS)
    #[default]
    Auth0,
    /// GitHub OAuth app (no refresh, no JWKS)
    Github,
}

impl From<Provider> for ProviderKind {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Auth0 => Self::Auth0,
            Provider::Github => Self::Github,
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = ?cli.provider,
        "Starting MCP OAuth bridge"
    );

    // All required upstream credentials are checked here; the broker
    // refuses to bind any route with an incomplete environment.
    let config = Config::from_env(cli.provider.into(), cli.base_url)?;

    BrokerServer::new(&config)?.run(cli.port).await
}
