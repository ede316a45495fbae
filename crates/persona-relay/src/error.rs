//! Error types for the persona relay

use thiserror::Error;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration errors (missing key, unreadable config file, bad address)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream API errors that are not transport failures
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),
}

/// Network-level failure talking to the upstream (no HTTP status was received)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    /// The request URL carries the API key, so it is dropped from the message
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            TransportError(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            TransportError(format!("Failed to connect to upstream: {e}"))
        } else {
            TransportError(format!("Request failed: {e}"))
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
