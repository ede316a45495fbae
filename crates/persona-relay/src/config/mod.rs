use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};

/// Main configuration structure for the relay
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Inbound HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream generative-language API configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Retry and backoff configuration for upstream calls
    #[serde(default)]
    pub retry: RetryConfig,
    /// CORS response header configuration
    #[serde(default)]
    pub cors: CorsConfig,
    /// Persona table configuration
    #[serde(default)]
    pub personas: PersonaConfig,
}

impl Config {
    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<()> {
        self.cors.validate()
    }

    /// Load from an explicit path, or from the first default location that exists
    ///
    /// Falls back to `Config::default()` when no file is found.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in Self::default_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Default config file locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::home_dir().map(|h| h.join(".persona-relay").join("config.toml")),
            dirs::config_dir().map(|c| c.join("persona-relay").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Route the relay is mounted on, in addition to "/"
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            path: default_path(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_path() -> String {
    "/api/ask".to_string()
}

/// Upstream generative-language API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Scheme and host of the API, without a trailing path
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier placed in the `models/{model}:generateContent` path
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-call timeout in seconds (unset = HTTP client default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// How many characters of an upstream error body are surfaced to the caller
    #[serde(default = "default_error_excerpt_chars")]
    pub error_excerpt_chars: usize,
    /// Reply text used when a successful response carries no candidate text
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: None,
            error_excerpt_chars: default_error_excerpt_chars(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_error_excerpt_chars() -> usize {
    100
}

fn default_fallback_reply() -> String {
    "System Error".to_string()
}

/// Retry and backoff configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

/// Which origins the relay advertises in `Access-Control-Allow-Origin`
///
/// Parsed from a single string: `"*"`, `"mirror"`, or an exact origin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum OriginPolicy {
    /// Always `*`
    Any,
    /// Echo the request's `Origin` header
    Mirror,
    /// Always this one origin
    Exact(String),
}

impl From<String> for OriginPolicy {
    fn from(value: String) -> Self {
        match value.trim() {
            "*" => OriginPolicy::Any,
            "mirror" => OriginPolicy::Mirror,
            other => OriginPolicy::Exact(other.to_string()),
        }
    }
}

/// CORS response header configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Allowed-origin policy
    #[serde(default = "default_allow_origin")]
    pub allow_origin: OriginPolicy,
    /// Value of `Access-Control-Allow-Credentials`
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
            allow_credentials: default_allow_credentials(),
        }
    }
}

impl CorsConfig {
    /// An exact origin must be usable as a header value
    pub fn validate(&self) -> Result<()> {
        if let OriginPolicy::Exact(origin) = &self.allow_origin {
            HeaderValue::from_str(origin).map_err(|e| {
                RelayError::Config(format!("Invalid CORS allow_origin '{}': {e}", origin.escape_debug()))
            })?;
        }
        Ok(())
    }
}

fn default_allow_origin() -> OriginPolicy {
    OriginPolicy::Any
}

fn default_allow_credentials() -> bool {
    true
}

/// Which request field keys into the persona table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaSelector {
    /// `context` field, with the hospital/jester/hint/quiz table
    #[default]
    Context,
    /// `mode` field, with the legacy tip/joke/generate table
    Mode,
}

impl PersonaSelector {
    /// Name of the request field this selector reads
    pub fn field_name(self) -> &'static str {
        match self {
            PersonaSelector::Context => "context",
            PersonaSelector::Mode => "mode",
        }
    }
}

/// Persona table configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PersonaConfig {
    /// Request field used for selection; also picks the built-in table
    #[serde(default)]
    pub selector: PersonaSelector,
    /// Personas added to, or replacing entries of, the built-in table
    #[serde(default)]
    pub entries: BTreeMap<String, PersonaEntry>,
}

/// One configured persona
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PersonaEntry {
    /// System prompt placed before the user's request
    pub prompt: String,
    /// Fixed instruction sent instead of the caller's message
    #[serde(default)]
    pub instruction: Option<String>,
    /// Strip markdown code fences from the reply
    #[serde(default)]
    pub strip_code_fences: bool,
}
