//! Router-level tests for the broker's inner OAuth leg.
//!
//! Everything here runs without an upstream: discovery, registration,
//! authorize redirects, consent, and token-endpoint error paths. The full
//! two-leg flows against a mocked upstream live in flow_tests.rs.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use mcp_oauth_bridge::config::Config;
use mcp_oauth_bridge::oauth::{ClientStore, InMemoryClientStore};
use mcp_oauth_bridge::server::create_router;
use mcp_oauth_bridge::upstream::{GithubProvider, UpstreamProvider};

const BASE_URL: &str = "http://localhost:3000";

fn build_test_router() -> axum::Router {
    build_test_router_with_store().0
}

fn build_test_router_with_store() -> (axum::Router, Arc<InMemoryClientStore>) {
    let config = Config::for_testing_github("https://github.invalid", BASE_URL);
    let provider: Arc<dyn UpstreamProvider> = Arc::new(GithubProvider::new(&config).unwrap());
    let store = Arc::new(InMemoryClientStore::new());
    let router = create_router(store.clone(), provider, BASE_URL.to_owned());
    (router, store)
}

async fn register_client(app: &axum::Router, redirect_uri: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "client_name": "Test Client",
                        "redirect_uris": [redirect_uri]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let client_info: serde_json::Value = serde_json::from_slice(&body).unwrap();
    client_info["client_id"].as_str().unwrap().to_owned()
}

// ─── Discovery ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_auth_server_metadata() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::get("/.well-known/oauth-authorization-server").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["issuer"], BASE_URL);
    assert_eq!(json["authorization_endpoint"], format!("{BASE_URL}/authorize"));
    assert_eq!(json["token_endpoint"], format!("{BASE_URL}/token"));
    assert_eq!(json["registration_endpoint"], format!("{BASE_URL}/register"));
    assert!(json["code_challenge_methods_supported"].as_array().unwrap().contains(&json!("S256")));
    assert!(
        json["token_endpoint_auth_methods_supported"].as_array().unwrap().contains(&json!("none"))
    );
}

#[tokio::test]
async fn test_jwks_empty_for_github() {
    let app = build_test_router();

    let response = app
        .oneshot(Request::get("/.well-known/jwks.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cache = response.headers().get("Cache-Control").unwrap().to_str().unwrap();
    assert!(cache.contains("max-age=86400"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["keys"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_health() {
    let app = build_test_router();

    let response =
        app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["upstream"], "github");
}

// ─── Dynamic Client Registration ─────────────────────────────────────────────

#[tokio::test]
async fn test_register_client() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "client_name": "Test Client",
                        "redirect_uris": ["http://localhost:8080/cb"],
                        "token_endpoint_auth_method": "client_secret_basic"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let client_id = json["client_id"].as_str().unwrap();
    let rest = client_id.strip_prefix("client_").unwrap();
    let (millis, suffix) = rest.split_once('_').unwrap();
    assert!(millis.chars().all(|c| c.is_ascii_digit()));
    assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

    assert_eq!(json["client_name"], "Test Client");
    assert!(json["client_id_issued_at"].as_i64().unwrap() > 0);
    // Public clients only, whatever the request asked for.
    assert_eq!(json["token_endpoint_auth_method"], "none");
}

#[tokio::test]
async fn test_register_requires_redirect_uris() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"client_name": "Bad Client"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_client_metadata");
}

// ─── Authorization ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authorize_requires_client_id_and_redirect_uri() {
    let app = build_test_router();

    let response = app
        .clone()
        .oneshot(
            Request::get("/authorize?redirect_uri=http://localhost/cb").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(Request::get("/authorize?client_id=c1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authorize_redirects_with_enriched_state() {
    let app = build_test_router();
    let client_id = register_client(&app, "http://localhost:8080/cb").await;

    let uri = format!(
        "/authorize?client_id={client_id}&redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcb&state=xyz"
    );
    let response =
        app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get("Location").unwrap().to_str().unwrap();
    assert!(location.starts_with("https://github.invalid/login/oauth/authorize?"));

    let url = url::Url::parse(location).unwrap();
    let state_param = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(
        state_param,
        format!(
            "mcp_client_id={client_id}&mcp_redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcb&original_state=xyz"
        )
    );
}

#[tokio::test]
async fn test_authorize_auto_registers_unseen_client() {
    let app = build_test_router();

    // Same unseen client_id twice with the same redirect_uri: both succeed.
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::get(
                    "/authorize?client_id=walkup-client&redirect_uri=http%3A%2F%2Flocalhost%2Fcb",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }
}

#[tokio::test]
async fn test_authorize_last_write_wins_pending_request() {
    let (app, store) = build_test_router_with_store();
    let client_id = register_client(&app, "http://first/cb").await;

    for redirect in ["http%3A%2F%2Ffirst%2Fcb", "http%3A%2F%2Fsecond%2Fcb"] {
        let uri = format!("/authorize?client_id={client_id}&redirect_uri={redirect}");
        let response =
            app.clone().oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    let client = store.get(&client_id).await.unwrap();
    assert_eq!(client.pending_request.unwrap().redirect_uri, "http://second/cb");
}

// ─── Token endpoint error paths ──────────────────────────────────────────────

#[tokio::test]
async fn test_token_unknown_code_rejected() {
    let app = build_test_router();

    let body_str = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", "auth_doesnotexist"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_token_missing_code_is_invalid_request() {
    let app = build_test_router();

    let body_str = serde_urlencoded::to_string([("grant_type", "authorization_code")]).unwrap();
    let response = app
        .oneshot(
            Request::post("/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_token_unsupported_grant_type() {
    let app = build_test_router();

    let body_str = serde_urlencoded::to_string([("grant_type", "client_credentials")]).unwrap();
    let response = app
        .oneshot(
            Request::post("/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_token_refresh_unsupported_for_github() {
    let app = build_test_router();

    let body_str = serde_urlencoded::to_string([
        ("grant_type", "refresh_token"),
        ("refresh_token", "gho_refresh"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_grant");
}

// ─── Consent ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_consent_denial_redirects_with_access_denied() {
    let (app, store) = build_test_router_with_store();
    let client_id = register_client(&app, "http://localhost:8080/cb").await;

    let body_str = serde_urlencoded::to_string([
        ("client_id", client_id.as_str()),
        ("redirect_uri", "http://localhost:8080/cb"),
        ("state", "xyz"),
        ("consent", "deny"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/authorize/consent")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get("Location").unwrap().to_str().unwrap();
    assert!(location.starts_with("http://localhost:8080/cb?"));
    assert!(location.contains("error=access_denied"));
    assert!(location.contains("state=xyz"));

    // Denial never mints a code.
    let client = store.get(&client_id).await.unwrap();
    assert!(client.authorization_code.is_none());
}

#[tokio::test]
async fn test_consent_approve_requires_pending_request() {
    let app = build_test_router();
    let client_id = register_client(&app, "http://localhost:8080/cb").await;

    let body_str = serde_urlencoded::to_string([
        ("client_id", client_id.as_str()),
        ("consent", "approve"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/authorize/consent")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_consent_approve_mints_code_from_pending() {
    let (app, store) = build_test_router_with_store();
    let client_id = register_client(&app, "http://localhost:8080/cb").await;

    // Start a flow so a pending request exists.
    let uri = format!(
        "/authorize?client_id={client_id}&redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcb&state=xyz"
    );
    let response =
        app.clone().oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let body_str = serde_urlencoded::to_string([
        ("client_id", client_id.as_str()),
        ("consent", "approve"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/authorize/consent")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get("Location").unwrap().to_str().unwrap();
    assert!(location.starts_with("http://localhost:8080/cb?code=auth_"));
    assert!(location.contains("state=xyz"));

    let client = store.get(&client_id).await.unwrap();
    assert!(client.authorization_code.is_some());
    // Pending request was consumed.
    assert!(client.pending_request.is_none());
}

// ─── CORS ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cors_preflight() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/token")
                .header("Origin", "https://client.example.com")
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("Access-Control-Allow-Origin"));
}
