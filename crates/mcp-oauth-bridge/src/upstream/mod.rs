//! Upstream identity bridge: the broker's own OAuth client leg.
//!
//! Each provider builds the outer authorization URL, exchanges upstream
//! codes for upstream tokens at the broker's fixed `/callback` redirect,
//! and (where supported) refreshes them. The broker treats the returned
//! token set as opaque.

pub mod auth0;
pub mod github;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{UpstreamError, UpstreamResult};
use crate::oauth::UpstreamTokenSet;

pub use auth0::Auth0Provider;
pub use github::GithubProvider;

/// The contract the broker depends on for the outer OAuth leg.
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Provider name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Build the upstream authorization URL carrying the enriched state.
    fn authorization_url(&self, enriched_state: &str) -> String;

    /// Exchange an upstream authorization code for upstream tokens.
    ///
    /// The redirect_uri presented upstream is always the broker's own
    /// `{base_url}/callback`, which must match the provider-side app
    /// registration.
    async fn exchange_code(&self, code: &str) -> UpstreamResult<UpstreamTokenSet>;

    /// Refresh upstream tokens. Providers without a refresh flow keep the
    /// default, which rejects the grant.
    async fn refresh_tokens(&self, _refresh_token: &str) -> UpstreamResult<UpstreamTokenSet> {
        Err(UpstreamError::RefreshUnsupported)
    }

    /// Signing keys for tokens this broker hands out. Providers that issue
    /// no verifiable JWTs keep the default empty key set.
    async fn jwks(&self) -> UpstreamResult<serde_json::Value> {
        Ok(serde_json::json!({ "keys": [] }))
    }
}

/// Build the shared HTTP client for upstream calls.
///
/// Explicit timeouts so a slow upstream surfaces as a gateway timeout
/// instead of stalling the request indefinitely.
pub(crate) fn build_http_client(config: &Config) -> UpstreamResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(UpstreamError::Http)
}

/// Read an upstream token response, mapping non-2xx statuses to
/// [`UpstreamError::Status`] with the body captured for logging only.
pub(crate) async fn read_token_response(
    response: reqwest::Response,
) -> UpstreamResult<UpstreamTokenSet> {
    let status = response.status();
    let body = response.text().await.map_err(UpstreamError::from)?;

    if !status.is_success() {
        return Err(UpstreamError::Status { status: status.as_u16(), body });
    }

    Ok(serde_json::from_str(&body)?)
}
