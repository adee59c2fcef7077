//! OAuth 2.0 types for the MCP authorization broker.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Authorization code lifetime: 10 minutes.
pub const AUTH_CODE_LIFETIME_SECS: u64 = 600;

/// Pending request lifetime before eviction: 10 minutes.
pub const PENDING_REQUEST_LIFETIME_SECS: u64 = 600;

/// A dynamically registered OAuth client, plus all broker-side state for it.
///
/// The broker is the only writer; the upstream bridge supplies token data
/// that the broker stores here.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    /// Issuance timestamp in seconds since the epoch (RFC 7591).
    pub client_id_issued_at: i64,
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    /// Always "none": every registered client is a public client.
    pub token_endpoint_auth_method: String,
    /// In-flight authorization attempt; overwritten on every `/authorize`.
    pub pending_request: Option<PendingRequest>,
    /// The broker's own code, minted after a completed upstream exchange.
    pub authorization_code: Option<IssuedCode>,
    /// Most recently obtained upstream token bundle.
    pub tokens: Option<UpstreamTokenSet>,
}

impl RegisteredClient {
    /// Create a fresh public client record with defaulted metadata.
    #[must_use]
    pub fn new(client_id: String, client_name: Option<String>, redirect_uris: Vec<String>) -> Self {
        Self {
            client_id,
            client_id_issued_at: chrono::Utc::now().timestamp(),
            client_name,
            redirect_uris,
            grant_types: vec!["authorization_code".to_owned(), "refresh_token".to_owned()],
            response_types: vec!["code".to_owned()],
            token_endpoint_auth_method: "none".to_owned(),
            pending_request: None,
            authorization_code: None,
            tokens: None,
        }
    }

    /// Generate a server-side client identifier: `client_{millis}_{random}`.
    #[must_use]
    pub fn generate_client_id() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("client_{}_{}", chrono::Utc::now().timestamp_millis(), &suffix[..12])
    }
}

/// Ephemeral capture of an `/authorize` call.
///
/// Created on `/authorize`, consumed on `/callback` or consent approval.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub state: Option<String>,
    pub created_at: Instant,
}

impl PendingRequest {
    /// Check if the pending request is stale (eviction policy).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed().as_secs() > PENDING_REQUEST_LIFETIME_SECS
    }
}

/// The broker's own authorization code handed to the MCP client.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    /// Opaque random string prefixed `auth_`.
    pub code: String,
    pub redirect_uri: String,
    /// PKCE challenge carried over from the pending request, if any.
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub created_at: Instant,
    pub used: bool,
}

impl IssuedCode {
    /// Mint a new code, carrying PKCE fields from the originating request.
    #[must_use]
    pub fn mint(
        redirect_uri: String,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> Self {
        Self {
            code: format!(
                "auth_{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            ),
            redirect_uri,
            code_challenge,
            code_challenge_method,
            created_at: Instant::now(),
            used: false,
        }
    }

    /// Check if the code has expired (10 minute lifetime).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed().as_secs() > AUTH_CODE_LIFETIME_SECS
    }
}

/// Opaque bag of whatever the upstream token endpoint returned.
///
/// The broker does not parse or validate this beyond presence checks; it is
/// serialized verbatim back to the MCP client at `/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamTokenSet {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Present for OIDC upstreams (Auth0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Present for GitHub's OAuth app responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}
