//! Upstream text-generation API
//!
//! The relay talks to the upstream through the `Upstream` trait so the retry
//! and response handling can run against a scripted double in tests.

mod gemini;
pub mod retry;
pub mod types;

use async_trait::async_trait;

use crate::error::TransportError;

pub use gemini::GeminiClient;
pub use retry::{RetryPolicy, Retryable};
pub use types::{GenerateContentRequest, GenerateContentResponse};

/// Raw HTTP outcome of one upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of one upstream call: an HTTP response, or a transport failure
pub type UpstreamResult = Result<UpstreamResponse, TransportError>;

/// Whether an HTTP status from the upstream is worth retrying (429 or any 5xx)
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

impl Retryable for UpstreamResult {
    fn is_retryable(&self) -> bool {
        match self {
            Ok(response) => !response.is_success() && is_transient_status(response.status),
            Err(_) => true,
        }
    }
}

/// A text-generation endpoint
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send one prompt, authenticated with `api_key`, and return the raw response
    async fn generate(&self, api_key: &str, prompt: &str) -> UpstreamResult;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
