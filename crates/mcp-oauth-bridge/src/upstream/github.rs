//! GitHub-backed upstream provider.
//!
//! GitHub's classic OAuth app flow: form-encoded token exchange, no PKCE
//! on the outer leg, no refresh (app tokens do not expire), and no JWKS
//! since GitHub is not an OIDC provider.

use async_trait::async_trait;

use super::{UpstreamProvider, build_http_client, read_token_response};
use crate::config::{Config, GithubSettings, ProviderSettings};
use crate::error::{UpstreamError, UpstreamResult};
use crate::oauth::{UpstreamTokenSet, state};

pub struct GithubProvider {
    settings: GithubSettings,
    callback_url: String,
    http: reqwest::Client,
}

impl GithubProvider {
    /// Build the provider from broker configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config holds non-GitHub settings or the
    /// HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let ProviderSettings::Github(settings) = &config.provider else {
            anyhow::bail!("config does not hold GitHub settings");
        };

        Ok(Self {
            settings: settings.clone(),
            callback_url: format!("{}/callback", config.base_url),
            http: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl UpstreamProvider for GithubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn authorization_url(&self, enriched_state: &str) -> String {
        format!(
            "{}/login/oauth/authorize?client_id={}&redirect_uri={}&scope={}&state={}",
            self.settings.oauth_base_url,
            state::url_encode(&self.settings.client_id),
            state::url_encode(&self.callback_url),
            state::url_encode("user:email read:user"),
            state::url_encode(enriched_state),
        )
    }

    async fn exchange_code(&self, code: &str) -> UpstreamResult<UpstreamTokenSet> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.settings.oauth_base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.callback_url.as_str()),
            ])
            .send()
            .await
            .map_err(UpstreamError::from)?;

        read_token_response(response).await
    }

    // refresh_tokens: default RefreshUnsupported.
    // jwks: default empty key set.
}
