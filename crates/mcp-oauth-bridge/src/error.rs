//! Error types for the MCP OAuth bridge.
//!
//! Uses `thiserror` for structured error handling with automatic `From`
//! implementations. Nothing retries: every failure is terminal for the
//! current request and the caller restarts the relevant OAuth step.

/// Errors from the upstream identity provider leg.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Upstream call exceeded the configured timeout
    #[error("Upstream request timed out")]
    Timeout,

    /// Upstream rejected the request (non-2xx). The body is logged by the
    /// caller, never echoed to the MCP client.
    #[error("Upstream returned status {status}")]
    Status {
        /// HTTP status code from the provider
        status: u16,
        /// Raw response body, for logs only
        body: String,
    },

    /// Upstream response body could not be parsed
    #[error("Failed to parse upstream response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The provider has no refresh flow (GitHub OAuth app tokens)
    #[error("Upstream provider does not support token refresh")]
    RefreshUnsupported,
}

impl UpstreamError {
    /// Returns true if the upstream rejected the grant itself (4xx), as
    /// opposed to an infrastructure failure.
    #[must_use]
    pub const fn is_grant_rejection(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 400 && *status < 500)
    }

    /// OAuth error code for a `/token` response.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::RefreshUnsupported => "invalid_grant",
            Self::Status { status, .. } if *status >= 400 && *status < 500 => "invalid_grant",
            _ => "server_error",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { Self::Timeout } else { Self::Http(err) }
    }
}

/// Errors from startup configuration validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// One or more required environment variables are unset. All missing
    /// names are reported at once so startup fails with one diagnostic.
    #[error("Missing required environment variables: {}", vars.join(", "))]
    MissingEnv {
        /// Names of the unset variables
        vars: Vec<String>,
    },

    /// A variable is present but unusable
    #[error("Invalid value for {var}: {message}")]
    InvalidValue {
        /// Variable name
        var: String,
        /// What is wrong with it
        message: String,
    },
}

/// Result type alias for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;
