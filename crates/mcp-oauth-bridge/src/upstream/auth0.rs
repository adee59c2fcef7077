//! Auth0-backed upstream provider.
//!
//! Confidential credentials (client secret) stay server-side; the MCP
//! client only ever sees the broker's own endpoints.

use async_trait::async_trait;

use super::{UpstreamProvider, build_http_client, read_token_response};
use crate::config::{Auth0Settings, Config, ProviderSettings};
use crate::error::{UpstreamError, UpstreamResult};
use crate::oauth::{UpstreamTokenSet, state};

pub struct Auth0Provider {
    settings: Auth0Settings,
    /// Fixed upstream redirect target: `{base_url}/callback`.
    callback_url: String,
    http: reqwest::Client,
}

impl Auth0Provider {
    /// Build the provider from broker configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config holds non-Auth0 settings or the HTTP
    /// client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let ProviderSettings::Auth0(settings) = &config.provider else {
            anyhow::bail!("config does not hold Auth0 settings");
        };

        Ok(Self {
            settings: settings.clone(),
            callback_url: format!("{}/callback", config.base_url),
            http: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl UpstreamProvider for Auth0Provider {
    fn name(&self) -> &'static str {
        "auth0"
    }

    fn authorization_url(&self, enriched_state: &str) -> String {
        format!(
            "https://{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&audience={}&state={}",
            self.settings.domain,
            state::url_encode(&self.settings.client_id),
            state::url_encode(&self.callback_url),
            state::url_encode("openid profile email"),
            state::url_encode(&self.settings.audience),
            state::url_encode(enriched_state),
        )
    }

    async fn exchange_code(&self, code: &str) -> UpstreamResult<UpstreamTokenSet> {
        let response = self
            .http
            .post(format!("{}/oauth/token", self.settings.issuer_url))
            .json(&serde_json::json!({
                "grant_type": "authorization_code",
                "client_id": self.settings.client_id,
                "client_secret": self.settings.client_secret,
                "code": code,
                "redirect_uri": self.callback_url,
            }))
            .send()
            .await
            .map_err(UpstreamError::from)?;

        read_token_response(response).await
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> UpstreamResult<UpstreamTokenSet> {
        let response = self
            .http
            .post(format!("{}/oauth/token", self.settings.issuer_url))
            .json(&serde_json::json!({
                "grant_type": "refresh_token",
                "client_id": self.settings.client_id,
                "client_secret": self.settings.client_secret,
                "refresh_token": refresh_token,
            }))
            .send()
            .await
            .map_err(UpstreamError::from)?;

        read_token_response(response).await
    }

    /// Proxy the tenant's JWKS. Fetched per request; the route layer adds
    /// a long-lived Cache-Control header for downstream caches.
    async fn jwks(&self) -> UpstreamResult<serde_json::Value> {
        let response = self
            .http
            .get(format!("{}/.well-known/jwks.json", self.settings.issuer_url))
            .send()
            .await
            .map_err(UpstreamError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        Ok(response.json().await.map_err(UpstreamError::from)?)
    }
}
