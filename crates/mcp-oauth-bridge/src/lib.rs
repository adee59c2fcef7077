//! MCP OAuth Bridge
//!
//! An OAuth 2.0 authorization server that fronts MCP (Model Context
//! Protocol) clients while delegating end-user login to an upstream
//! identity provider (Auth0 or GitHub). The broker runs two OAuth legs at
//! once: toward the MCP client it serves discovery metadata, dynamic
//! registration, authorization codes, and token exchange; toward the
//! upstream it is a confidential OAuth client holding the real secrets.
//!
//! # Example
//!
//! ```no_run
//! use mcp_oauth_bridge::{
//!     config::{Config, ProviderKind},
//!     server::BrokerServer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env(ProviderKind::Github, "http://localhost:3000".into())?;
//!     BrokerServer::new(&config)?.run(3000).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod oauth;
pub mod server;
pub mod upstream;

pub use config::Config;
pub use error::{ConfigError, UpstreamError};
pub use server::BrokerServer;
