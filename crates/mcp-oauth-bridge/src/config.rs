//! Configuration for the MCP OAuth bridge.
//!
//! All required environment variables are validated up front: startup
//! fails with a single diagnostic listing every missing variable before
//! any route binds.

use std::time::Duration;

use crate::error::ConfigError;

/// Upstream call timeouts.
pub mod upstream {
    use std::time::Duration;

    /// Request timeout for upstream token/JWKS calls.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Which upstream identity provider backs the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Auth0,
    Github,
}

/// Auth0 (OIDC) upstream settings.
#[derive(Debug, Clone)]
pub struct Auth0Settings {
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    /// Base URL for token/JWKS endpoints; `https://{domain}` in production,
    /// overridden to point at a mock server in tests.
    pub issuer_url: String,
}

/// GitHub OAuth app upstream settings.
#[derive(Debug, Clone)]
pub struct GithubSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Base URL for `login/oauth/*`; overridden in tests.
    pub oauth_base_url: String,
}

/// Provider-specific configuration.
#[derive(Debug, Clone)]
pub enum ProviderSettings {
    Auth0(Auth0Settings),
    Github(GithubSettings),
}

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of the broker; the upstream redirect target is
    /// always `{base_url}/callback`.
    pub base_url: String,

    /// Upstream provider settings.
    pub provider: ProviderSettings,

    /// Upstream request timeout.
    pub request_timeout: Duration,

    /// Upstream connection timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Build configuration for the chosen provider from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] naming every unset variable.
    pub fn from_env(kind: ProviderKind, base_url: String) -> Result<Self, ConfigError> {
        let provider = match kind {
            ProviderKind::Auth0 => {
                let vars = require_env(&[
                    "AUTH0_DOMAIN",
                    "AUTH0_CLIENT_ID",
                    "AUTH0_CLIENT_SECRET",
                    "AUTH0_AUDIENCE",
                ])?;
                let [domain, client_id, client_secret, audience] = vars;
                let issuer_url = format!("https://{domain}");
                ProviderSettings::Auth0(Auth0Settings {
                    domain,
                    client_id,
                    client_secret,
                    audience,
                    issuer_url,
                })
            }
            ProviderKind::Github => {
                let vars = require_env(&["GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"])?;
                let [client_id, client_secret] = vars;
                ProviderSettings::Github(GithubSettings {
                    client_id,
                    client_secret,
                    oauth_base_url: "https://github.com".to_owned(),
                })
            }
        };

        Ok(Self {
            base_url,
            provider,
            request_timeout: upstream::REQUEST_TIMEOUT,
            connect_timeout: upstream::CONNECT_TIMEOUT,
        })
    }

    /// Auth0 test configuration pointing at a mock issuer.
    #[must_use]
    pub fn for_testing_auth0(mock_issuer_url: &str, base_url: &str) -> Self {
        Self {
            base_url: base_url.to_owned(),
            provider: ProviderSettings::Auth0(Auth0Settings {
                domain: "test.auth0.local".to_owned(),
                client_id: "upstream-client".to_owned(),
                client_secret: "upstream-secret".to_owned(),
                audience: "https://api.test.local".to_owned(),
                issuer_url: mock_issuer_url.to_owned(),
            }),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// GitHub test configuration pointing at a mock OAuth host.
    #[must_use]
    pub fn for_testing_github(mock_base_url: &str, base_url: &str) -> Self {
        Self {
            base_url: base_url.to_owned(),
            provider: ProviderSettings::Github(GithubSettings {
                client_id: "upstream-client".to_owned(),
                client_secret: "upstream-secret".to_owned(),
                oauth_base_url: mock_base_url.to_owned(),
            }),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// Read all named variables, collecting every missing one into a single
/// error. A set-but-empty variable counts as missing.
fn require_env<const N: usize>(names: &[&str; N]) -> Result<[String; N], ConfigError> {
    let mut values = Vec::with_capacity(N);
    let mut missing = Vec::new();

    for name in names {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => values.push(value),
            _ => missing.push((*name).to_owned()),
        }
    }

    if missing.is_empty() {
        Ok(values.try_into().unwrap_or_else(|_| unreachable!("length checked")))
    } else {
        Err(ConfigError::MissingEnv { vars: missing })
    }
}
