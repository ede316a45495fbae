//! Gemini `generateContent` client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{RelayError, Result, TransportError};

use super::types::GenerateContentRequest;
use super::{Upstream, UpstreamResponse, UpstreamResult};

/// Upstream backed by the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: Url,
}

impl GeminiClient {
    /// Build a client for `{base_url}/v1beta/models/{model}:generateContent`
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RelayError::Upstream(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = Self::endpoint_url(&config.base_url, &config.model)?;
        info!("GeminiClient initialized with endpoint: {}", endpoint);

        Ok(Self { client, endpoint })
    }

    fn endpoint_url(base_url: &str, model: &str) -> Result<Url> {
        let raw = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );
        Url::parse(&raw)
            .map_err(|e| RelayError::Config(format!("Invalid upstream URL '{raw}': {e}")))
    }

    /// Endpoint without credentials
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url_with_key(&self, api_key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", api_key);
        url
    }
}

#[async_trait]
impl Upstream for GeminiClient {
    async fn generate(&self, api_key: &str, prompt: &str) -> UpstreamResult {
        let request = GenerateContentRequest::user_text(prompt);
        debug!("Calling upstream at: {}", self.endpoint);

        let response = self
            .client
            .post(self.url_with_key(api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            TransportError(format!("Failed to read upstream response body: {e}"))
        })?;

        Ok(UpstreamResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(base_url: String) -> UpstreamConfig {
        UpstreamConfig {
            base_url,
            timeout_secs: Some(10),
            ..UpstreamConfig::default()
        }
    }

    #[test]
    fn test_endpoint_url() {
        let client = GeminiClient::new(&UpstreamConfig::default()).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        let client = GeminiClient::new(&create_test_config("http://localhost:9000/".to_string()))
            .unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = GeminiClient::new(&create_test_config("not a url".to_string()));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Invalid upstream URL"));
    }

    #[test]
    fn test_api_key_is_query_encoded() {
        let client = GeminiClient::new(&UpstreamConfig::default()).unwrap();
        let url = client.url_with_key("a b&c");
        assert_eq!(url.query(), Some("key=a+b%26c"));
        // The stored endpoint never carries the key
        assert!(client.endpoint().query().is_none());
    }

    #[tokio::test]
    async fn test_generate_sends_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"candidates\":[]}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(&create_test_config(mock_server.uri())).unwrap();
        let response = client.generate("test-key", "hello").await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"candidates\":[]}");
    }

    #[tokio::test]
    async fn test_generate_passes_error_status_through() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(&create_test_config(mock_server.uri())).unwrap();
        let response = client.generate("k", "hi").await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, "model not found");
    }

    #[tokio::test]
    async fn test_generate_connection_refused_is_transport_error() {
        // Bind then drop a server so the port is very likely closed
        let uri = {
            let mock_server = MockServer::start().await;
            mock_server.uri()
        };

        let client = GeminiClient::new(&create_test_config(uri)).unwrap();
        let err = client.generate("secret-key", "hi").await.unwrap_err();

        assert!(!err.to_string().contains("secret-key"));
    }

    #[test]
    fn test_name() {
        let client = GeminiClient::new(&UpstreamConfig::default()).unwrap();
        assert_eq!(client.name(), "gemini");
    }
}
