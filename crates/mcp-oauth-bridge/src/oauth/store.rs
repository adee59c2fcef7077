//! Client registry: an injectable store capability plus the in-memory
//! implementation the broker ships with.
//!
//! The broker only depends on the [`ClientStore`] trait, so a deployment
//! can back registrations with a real cache without touching broker logic.
//! Eviction of stale pending requests and dead codes is a store-level
//! policy handled by a background cleanup task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::{AUTH_CODE_LIFETIME_SECS, RegisteredClient};

/// Cleanup interval: 5 minutes.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Capability the broker depends on for client state.
///
/// `put` is a full overwrite/upsert keyed by `client_id`; the broker reads
/// a record, mutates its copy, and writes it back. Concurrent `/authorize`
/// calls for one client race last-write-wins, which is accepted: a
/// legitimate client runs one flow at a time.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Look up a client by its identifier.
    async fn get(&self, client_id: &str) -> Option<RegisteredClient>;

    /// Insert or replace a client record.
    async fn put(&self, client: RegisteredClient);

    /// Find the client holding a given authorization code.
    async fn find_by_code(&self, code: &str) -> Option<RegisteredClient>;

    /// Find the client holding a given upstream refresh token, so a
    /// refresh grant can update the owning record.
    async fn find_by_refresh_token(&self, refresh_token: &str) -> Option<RegisteredClient>;
}

/// In-memory client registry. Process restart drops all registrations,
/// pending flows, issued codes, and cached upstream tokens.
#[derive(Clone, Default)]
pub struct InMemoryClientStore {
    clients: Arc<RwLock<HashMap<String, RegisteredClient>>>,
}

impl InMemoryClientStore {
    #[must_use]
    pub fn new() -> Self {
        Self { clients: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Number of registered clients (diagnostics).
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Start the background eviction task for stale pending requests and
    /// expired or spent authorization codes. Client records themselves
    /// live until process restart.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        });
    }

    async fn cleanup_expired(&self) {
        let mut clients = self.clients.write().await;
        let mut pruned_pending = 0usize;
        let mut pruned_codes = 0usize;

        for client in clients.values_mut() {
            if client.pending_request.as_ref().is_some_and(super::types::PendingRequest::is_expired)
            {
                client.pending_request = None;
                pruned_pending += 1;
            }
            if let Some(code) = &client.authorization_code {
                // Spent codes linger briefly so replays get a clean
                // invalid_grant instead of an unknown-code error.
                let spent_and_stale =
                    code.used && code.created_at.elapsed().as_secs() > AUTH_CODE_LIFETIME_SECS;
                if code.is_expired() || spent_and_stale {
                    client.authorization_code = None;
                    pruned_codes += 1;
                }
            }
        }

        if pruned_pending > 0 || pruned_codes > 0 {
            tracing::debug!(
                pending = pruned_pending,
                codes = pruned_codes,
                "Evicted stale authorization state"
            );
        }
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn get(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.read().await.get(client_id).cloned()
    }

    async fn put(&self, client: RegisteredClient) {
        self.clients.write().await.insert(client.client_id.clone(), client);
    }

    async fn find_by_code(&self, code: &str) -> Option<RegisteredClient> {
        let clients = self.clients.read().await;
        clients
            .values()
            .find(|c| c.authorization_code.as_ref().is_some_and(|issued| issued.code == code))
            .cloned()
    }

    async fn find_by_refresh_token(&self, refresh_token: &str) -> Option<RegisteredClient> {
        let clients = self.clients.read().await;
        clients
            .values()
            .find(|c| {
                c.tokens.as_ref().and_then(|t| t.refresh_token.as_deref()) == Some(refresh_token)
            })
            .cloned()
    }
}

impl std::fmt::Debug for InMemoryClientStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryClientStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::{IssuedCode, UpstreamTokenSet};

    fn sample_client(id: &str) -> RegisteredClient {
        RegisteredClient::new(id.to_owned(), Some("Test App".into()), vec![
            "http://localhost/callback".into(),
        ])
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemoryClientStore::new();
        store.put(sample_client("c1")).await;

        let client = store.get("c1").await.unwrap();
        assert_eq!(client.client_name.as_deref(), Some("Test App"));
        assert_eq!(client.token_endpoint_auth_method, "none");
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_put_is_full_overwrite() {
        let store = InMemoryClientStore::new();
        store.put(sample_client("c1")).await;

        let mut updated = store.get("c1").await.unwrap();
        updated.redirect_uris = vec!["http://other/cb".into()];
        store.put(updated).await;

        let client = store.get("c1").await.unwrap();
        assert_eq!(client.redirect_uris, vec!["http://other/cb".to_owned()]);
    }

    #[tokio::test]
    async fn test_find_by_code() {
        let store = InMemoryClientStore::new();
        let mut client = sample_client("c1");
        let code = IssuedCode::mint("http://localhost/cb".into(), None, None);
        let code_value = code.code.clone();
        client.authorization_code = Some(code);
        store.put(client).await;
        store.put(sample_client("c2")).await;

        let found = store.find_by_code(&code_value).await.unwrap();
        assert_eq!(found.client_id, "c1");
        assert!(store.find_by_code("auth_nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_find_by_refresh_token() {
        let store = InMemoryClientStore::new();
        let mut client = sample_client("c1");
        client.tokens = Some(UpstreamTokenSet {
            access_token: "at".into(),
            token_type: "Bearer".into(),
            expires_in: Some(3600),
            refresh_token: Some("rt_1".into()),
            id_token: None,
            scope: None,
        });
        store.put(client).await;

        assert_eq!(store.find_by_refresh_token("rt_1").await.unwrap().client_id, "c1");
        assert!(store.find_by_refresh_token("rt_other").await.is_none());
    }
}
