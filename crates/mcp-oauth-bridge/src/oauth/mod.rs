//! OAuth 2.0 authorization broker state: client registry, enriched-state
//! codec, PKCE verification, and the broker-side data model.
//!
//! ## Supported Standards
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code Grant

pub mod pkce;
pub mod state;
pub mod store;
pub mod types;

pub use store::{ClientStore, InMemoryClientStore};
pub use types::{IssuedCode, PendingRequest, RegisteredClient, UpstreamTokenSet};
