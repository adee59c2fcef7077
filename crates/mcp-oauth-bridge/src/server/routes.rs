//! HTTP route surface for the authorization broker.
//!
//! Implements:
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: OAuth 2.0 Authorization Code Grant
//!
//! Error shapes are deliberately asymmetric: `/register` and `/token` are
//! API legs and return `{error, error_description}` JSON; `/authorize`,
//! `/callback`, and `/authorize/consent` are browser-redirect legs and
//! return plain text that renders in a user agent.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::UpstreamError;
use crate::oauth::state::{self as state_codec, url_encode};
use crate::oauth::types::{IssuedCode, PendingRequest, RegisteredClient};
use crate::oauth::{ClientStore, pkce};
use crate::upstream::UpstreamProvider;

/// Shared state for broker handlers.
pub struct BrokerState {
    pub store: Arc<dyn ClientStore>,
    pub provider: Arc<dyn UpstreamProvider>,
    /// Public base URL, advertised in discovery metadata.
    pub base_url: String,
}

/// Create the broker router.
pub fn create_router(
    store: Arc<dyn ClientStore>,
    provider: Arc<dyn UpstreamProvider>,
    base_url: String,
) -> axum::Router {
    let state = Arc::new(BrokerState { store, provider, base_url });

    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/.well-known/oauth-authorization-server", get(handle_metadata))
        .route("/.well-known/jwks.json", get(handle_jwks))
        .route("/register", post(handle_register))
        .route("/authorize", get(handle_authorize))
        .route("/callback", get(handle_callback))
        .route("/token", post(handle_token))
        .route("/authorize/consent", post(handle_consent))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health(State(state): State<Arc<BrokerState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mcp-oauth-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "upstream": state.provider.name()
    }))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
///
/// Advertises the broker's own endpoints, never the upstream's.
async fn handle_metadata(State(state): State<Arc<BrokerState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "issuer": state.base_url,
        "authorization_endpoint": format!("{}/authorize", state.base_url),
        "token_endpoint": format!("{}/token", state.base_url),
        "registration_endpoint": format!("{}/register", state.base_url),
        "jwks_uri": format!("{}/.well-known/jwks.json", state.base_url),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["none"],
        "code_challenge_methods_supported": ["S256"]
    }))
}

/// `GET /.well-known/jwks.json`
///
/// Proxies the upstream's signing keys (empty set for non-OIDC upstreams).
async fn handle_jwks(State(state): State<Arc<BrokerState>>) -> Response {
    match state.provider.jwks().await {
        Ok(keys) => {
            let mut response = Json(keys).into_response();
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=86400"),
            );
            response
        }
        Err(err) => {
            tracing::error!(upstream = state.provider.name(), error = %err, "JWKS fetch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch signing keys").into_response()
        }
    }
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
}

/// `POST /register`
///
/// Register a new public OAuth client dynamically. `token_endpoint_auth_method`
/// is always "none" regardless of what the client asked for.
async fn handle_register(
    State(state): State<Arc<BrokerState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let redirect_uris = req.redirect_uris.unwrap_or_default();
    if redirect_uris.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "invalid_client_metadata",
                "error_description": "redirect_uris is required"
            })),
        )
            .into_response();
    }

    let mut client = RegisteredClient::new(
        RegisteredClient::generate_client_id(),
        req.client_name,
        redirect_uris,
    );
    if !req.grant_types.is_empty() {
        client.grant_types = req.grant_types;
    }
    if !req.response_types.is_empty() {
        client.response_types = req.response_types;
    }

    let body = serde_json::json!({
        "client_id": client.client_id,
        "client_id_issued_at": client.client_id_issued_at,
        "client_name": client.client_name,
        "redirect_uris": client.redirect_uris,
        "grant_types": client.grant_types,
        "response_types": client.response_types,
        "token_endpoint_auth_method": client.token_endpoint_auth_method
    });

    tracing::info!(client_id = %client.client_id, "Registered OAuth client");
    state.store.put(client).await;

    (StatusCode::CREATED, Json(body)).into_response()
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// `GET /authorize`
///
/// Starts the inner leg: captures the request as a pending record and
/// redirects the user agent to the upstream provider with the enriched
/// state. Unseen client ids auto-register as public clients, so MCP
/// clients that skip `/register` still work.
async fn handle_authorize(
    State(state): State<Arc<BrokerState>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    let Some(client_id) = query.client_id.as_deref() else {
        return (StatusCode::BAD_REQUEST, "Missing client_id").into_response();
    };
    let Some(redirect_uri) = query.redirect_uri.as_deref() else {
        return (StatusCode::BAD_REQUEST, "Missing redirect_uri").into_response();
    };

    let mut client = match state.store.get(client_id).await {
        Some(client) => client,
        None => {
            tracing::info!(client_id = %client_id, "Auto-registering unseen client");
            RegisteredClient::new(client_id.to_owned(), None, vec![redirect_uri.to_owned()])
        }
    };

    // Last write wins: a new /authorize replaces any in-flight attempt.
    client.pending_request = Some(PendingRequest {
        redirect_uri: redirect_uri.to_owned(),
        code_challenge: query.code_challenge.clone(),
        code_challenge_method: query.code_challenge_method.clone(),
        state: query.state.clone(),
        created_at: std::time::Instant::now(),
    });
    state.store.put(client).await;

    let enriched = state_codec::encode(client_id, redirect_uri, query.state.as_deref());
    let upstream_url = state.provider.authorization_url(&enriched);

    tracing::info!(client_id = %client_id, upstream = state.provider.name(), "Redirecting to upstream authorization");

    (StatusCode::FOUND, [(header::LOCATION, upstream_url)]).into_response()
}

// ─── Upstream Callback ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `GET /callback`
///
/// Upstream redirect target. Decodes the enriched state back into the MCP
/// client's identity, exchanges the upstream code for upstream tokens,
/// mints the broker's own authorization code, and sends the user agent
/// back to the original MCP redirect_uri.
async fn handle_callback(
    State(state): State<Arc<BrokerState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(err) = query.error.as_deref() {
        tracing::warn!(
            upstream = state.provider.name(),
            error = %err,
            description = query.error_description.as_deref().unwrap_or(""),
            "Upstream denied authorization"
        );
        return (StatusCode::BAD_REQUEST, "Upstream authorization failed").into_response();
    }

    let Some(decoded) = query.state.as_deref().and_then(state_codec::decode) else {
        return (StatusCode::BAD_REQUEST, "Invalid state parameter").into_response();
    };

    let Some(mut client) = state.store.get(&decoded.client_id).await else {
        return (StatusCode::BAD_REQUEST, "Unknown client").into_response();
    };

    let Some(code) = query.code.as_deref() else {
        return (StatusCode::BAD_REQUEST, "Missing code").into_response();
    };

    // The redirect target for the user agent is the MCP client's own URI,
    // recovered from the state (falling back to the pending request).
    let Some(redirect_uri) = decoded
        .redirect_uri
        .or_else(|| client.pending_request.as_ref().map(|p| p.redirect_uri.clone()))
    else {
        return (StatusCode::BAD_REQUEST, "No redirect_uri for this authorization").into_response();
    };

    let tokens = match state.provider.exchange_code(code).await {
        Ok(tokens) => tokens,
        Err(err) => return upstream_failure_page(&state, &err, "code exchange"),
    };

    let pending = client.pending_request.take();
    let issued = IssuedCode::mint(
        redirect_uri.clone(),
        pending.as_ref().and_then(|p| p.code_challenge.clone()),
        pending.as_ref().and_then(|p| p.code_challenge_method.clone()),
    );
    let code_value = issued.code.clone();

    client.tokens = Some(tokens);
    client.authorization_code = Some(issued);
    tracing::info!(client_id = %client.client_id, "Issued authorization code");
    state.store.put(client).await;

    let mut location = redirect_uri;
    push_query(&mut location, "code", &code_value);
    if !decoded.original_state.is_empty() {
        push_query(&mut location, "state", &decoded.original_state);
    }

    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Map an upstream failure to a browser-facing plain-text response.
/// Raw upstream bodies go to the logs, never to the user agent.
fn upstream_failure_page(state: &BrokerState, err: &UpstreamError, op: &str) -> Response {
    match err {
        UpstreamError::Status { status, body } => {
            tracing::error!(
                upstream = state.provider.name(),
                status = *status,
                body = %body,
                "Upstream {op} rejected"
            );
            if err.is_grant_rejection() {
                (StatusCode::BAD_REQUEST, "Upstream rejected the authorization code")
                    .into_response()
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, "Upstream token exchange failed")
                    .into_response()
            }
        }
        UpstreamError::Timeout => {
            tracing::error!(upstream = state.provider.name(), "Upstream {op} timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Upstream identity provider timed out").into_response()
        }
        _ => {
            tracing::error!(upstream = state.provider.name(), error = %err, "Upstream {op} failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Upstream token exchange failed").into_response()
        }
    }
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub client_id: Option<String>,
    pub refresh_token: Option<String>,
}

/// `POST /token`
///
/// Returns the previously stored upstream token set for an authorization
/// code, or delegates a refresh to the upstream provider.
async fn handle_token(
    State(state): State<Arc<BrokerState>>,
    Form(form): Form<TokenRequest>,
) -> Response {
    match form.grant_type.as_str() {
        "authorization_code" => handle_authorization_code_grant(&state, &form).await,
        "refresh_token" => handle_refresh_token_grant(&state, &form).await,
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "unsupported_grant_type"
            })),
        )
            .into_response(),
    }
}

async fn handle_authorization_code_grant(state: &BrokerState, form: &TokenRequest) -> Response {
    let Some(code) = form.code.as_deref() else {
        return token_error("invalid_request", "Missing code");
    };

    let Some(mut client) = state.store.find_by_code(code).await else {
        return token_error("invalid_grant", "Unknown authorization code");
    };
    // find_by_code matched on this exact code, so the record holds one.
    let Some(issued) = client.authorization_code.as_mut() else {
        return token_error("invalid_grant", "Unknown authorization code");
    };

    if issued.is_expired() {
        return token_error("invalid_grant", "Authorization code expired");
    }
    if issued.used {
        return token_error("invalid_grant", "Authorization code already redeemed");
    }

    // PKCE is enforced whenever the client bound a challenge to this flow.
    if let Some(challenge) = issued.code_challenge.as_deref() {
        let Some(verifier) = form.code_verifier.as_deref() else {
            return token_error("invalid_request", "Missing code_verifier");
        };
        if !pkce::verify_s256(verifier, challenge) {
            return token_error("invalid_grant", "PKCE verification failed");
        }
    }

    issued.used = true;

    let Some(tokens) = client.tokens.clone() else {
        tracing::error!(client_id = %client.client_id, "Code matched but no upstream tokens stored");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "server_error",
                "error_description": "No upstream tokens available for this client"
            })),
        )
            .into_response();
    };

    tracing::info!(client_id = %client.client_id, "Redeemed authorization code");
    state.store.put(client).await;

    token_success(&tokens)
}

async fn handle_refresh_token_grant(state: &BrokerState, form: &TokenRequest) -> Response {
    let Some(refresh_token) = form.refresh_token.as_deref() else {
        return token_error("invalid_request", "Missing refresh_token");
    };

    let tokens = match state.provider.refresh_tokens(refresh_token).await {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::warn!(upstream = state.provider.name(), error = %err, "Upstream refresh failed");
            let status = if err.oauth_error_code() == "server_error" {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::BAD_REQUEST
            };
            return (
                status,
                Json(serde_json::json!({
                    "error": err.oauth_error_code(),
                    "error_description": "Upstream token refresh failed"
                })),
            )
                .into_response();
        }
    };

    // Update the owning record so the rotated token set is what later
    // grants see. An unknown refresh token still succeeds upstream-wise;
    // there is just nothing to update.
    if let Some(mut client) = state.store.find_by_refresh_token(refresh_token).await {
        client.tokens = Some(tokens.clone());
        tracing::info!(client_id = %client.client_id, "Stored refreshed upstream tokens");
        state.store.put(client).await;
    }

    token_success(&tokens)
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(tokens: &crate::oauth::UpstreamTokenSet) -> Response {
    let mut response = Json(tokens).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn token_error(error: &str, description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response()
}

// ─── Consent ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub consent: Option<String>,
}

/// `POST /authorize/consent`
///
/// Explicit consent path that short-circuits the upstream redirect: denial
/// bounces straight back with `error=access_denied`; approval mints a code
/// against the in-flight authorization request.
async fn handle_consent(
    State(state): State<Arc<BrokerState>>,
    Form(form): Form<ConsentRequest>,
) -> Response {
    if form.consent.as_deref() != Some("approve") {
        let Some(redirect_uri) = form.redirect_uri.as_deref() else {
            return (StatusCode::BAD_REQUEST, "Missing redirect_uri").into_response();
        };
        let mut location = redirect_uri.to_owned();
        push_query(&mut location, "error", "access_denied");
        if let Some(s) = form.state.as_deref() {
            push_query(&mut location, "state", s);
        }
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }

    let Some(client_id) = form.client_id.as_deref() else {
        return (StatusCode::BAD_REQUEST, "Missing client_id").into_response();
    };
    let Some(mut client) = state.store.get(client_id).await else {
        return (StatusCode::BAD_REQUEST, "Unknown client").into_response();
    };
    // Approval without a prior /authorize has nothing to consent to.
    let Some(pending) = client.pending_request.take() else {
        return (StatusCode::BAD_REQUEST, "No authorization request in progress").into_response();
    };

    let issued = IssuedCode::mint(
        pending.redirect_uri.clone(),
        pending.code_challenge.clone(),
        pending.code_challenge_method.clone(),
    );
    let code_value = issued.code.clone();
    client.authorization_code = Some(issued);
    tracing::info!(client_id = %client.client_id, "Consent approved, issued authorization code");
    state.store.put(client).await;

    let mut location = pending.redirect_uri;
    push_query(&mut location, "code", &code_value);
    if let Some(s) = pending.state.as_deref() {
        push_query(&mut location, "state", s);
    }

    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Append a percent-encoded query parameter to a URL in place.
fn push_query(url: &mut String, key: &str, value: &str) {
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(key);
    url.push('=');
    url.push_str(&url_encode(value));
}
