//! Broker server: route wiring and the HTTP run loop.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{Config, ProviderSettings};
use crate::oauth::{ClientStore, InMemoryClientStore};
use crate::upstream::{Auth0Provider, GithubProvider, UpstreamProvider};

pub use routes::create_router;

/// The authorization broker, bound to one upstream provider.
pub struct BrokerServer {
    store: Arc<InMemoryClientStore>,
    provider: Arc<dyn UpstreamProvider>,
    base_url: String,
}

impl BrokerServer {
    /// Build the broker from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream HTTP client cannot be constructed.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let provider: Arc<dyn UpstreamProvider> = match &config.provider {
            ProviderSettings::Auth0(_) => Arc::new(Auth0Provider::new(config)?),
            ProviderSettings::Github(_) => Arc::new(GithubProvider::new(config)?),
        };

        Ok(Self {
            store: Arc::new(InMemoryClientStore::new()),
            provider,
            base_url: config.base_url.clone(),
        })
    }

    /// Run the HTTP server until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns error on bind or serve failure.
    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(
            upstream = self.provider.name(),
            base_url = %self.base_url,
            "Starting MCP OAuth bridge"
        );

        // Registry eviction runs for the life of the process.
        Arc::clone(&self.store).start_cleanup_task();

        let store: Arc<dyn ClientStore> = self.store;
        let router = create_router(store, self.provider, self.base_url);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("Broker listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("Broker shut down");
        Ok(())
    }
}

impl std::fmt::Debug for BrokerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerServer")
            .field("upstream", &self.provider.name())
            .field("base_url", &self.base_url)
            .finish()
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install CTRL+C handler");
    } else {
        tracing::info!("Received shutdown signal");
    }
}
