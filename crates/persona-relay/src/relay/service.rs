//! Relay core: key check, persona selection, upstream call, reply normalization
//!
//! Independent of axum; the HTTP layer only handles methods and CORS.

use std::env;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{Config, PersonaSelector};
use crate::persona::{Persona, PersonaTable};
use crate::upstream::types::{ApiError, GenerateContentResponse};
use crate::upstream::{RetryPolicy, Upstream, UpstreamResponse};

use super::types::{AskRequest, RelayResponse};

/// Stateless request relay shared by all handlers
pub struct Relay {
    upstream: Arc<dyn Upstream>,
    personas: PersonaTable,
    retry: RetryPolicy,
    api_key_env: String,
    error_excerpt_chars: usize,
    fallback_reply: String,
}

impl Relay {
    pub fn new(config: &Config, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            upstream,
            personas: PersonaTable::from_config(&config.personas),
            retry: RetryPolicy::from(&config.retry),
            api_key_env: config.upstream.api_key_env.clone(),
            error_excerpt_chars: config.upstream.error_excerpt_chars,
            fallback_reply: config.upstream.fallback_reply.clone(),
        }
    }

    /// Replace the persona table built from config
    pub fn with_personas(mut self, personas: PersonaTable) -> Self {
        self.personas = personas;
        self
    }

    /// Read the API key from the environment; empty counts as missing
    fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    fn select_persona(&self, request: &AskRequest) -> &Persona {
        let key = match self.personas.selector() {
            PersonaSelector::Context => request.context.as_deref(),
            PersonaSelector::Mode => request.mode.as_deref(),
        };
        debug!("Selecting persona for key {:?}", key);
        self.personas.select(key)
    }

    /// Handle one POSTed request end to end
    pub async fn ask(&self, request: &AskRequest) -> RelayResponse {
        let Some(api_key) = self.api_key() else {
            error!("Upstream API key env var '{}' is not set", self.api_key_env);
            return RelayResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Missing {}", self.api_key_env),
            );
        };

        let persona = self.select_persona(request);
        let prompt = persona.build_prompt(request.message.as_deref());

        let outcome = self
            .retry
            .execute(|attempt| {
                debug!(
                    "Upstream attempt {}/{} via {}",
                    attempt + 1,
                    self.retry.max_attempts(),
                    self.upstream.name()
                );
                self.upstream.generate(&api_key, &prompt)
            })
            .await;

        match outcome {
            Ok(response) if response.is_success() => self.handle_success(persona, &response),
            Ok(response) => self.handle_failure_status(&response),
            Err(e) => {
                error!(
                    "Upstream unreachable after {} attempts: {}",
                    self.retry.max_attempts(),
                    e
                );
                RelayResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    fn handle_success(&self, persona: &Persona, response: &UpstreamResponse) -> RelayResponse {
        let body: Value = match serde_json::from_str(&response.body) {
            Ok(body) => body,
            Err(e) => {
                warn!("Upstream returned an unparseable success body: {e}");
                return RelayResponse::reply(self.fallback_reply.clone());
            }
        };

        if let Some(api_error) = ApiError::from_body(&body) {
            let message = api_error.describe();
            error!("Upstream reported an error in a success response: {message}");
            return RelayResponse::error(StatusCode::INTERNAL_SERVER_ERROR, message);
        }

        let parsed: GenerateContentResponse = match serde_json::from_value(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Upstream success body has an unexpected shape: {e}");
                return RelayResponse::reply(self.fallback_reply.clone());
            }
        };

        match parsed.first_text().filter(|text| !text.is_empty()) {
            Some(text) => {
                info!("Relayed upstream reply ({} chars)", text.chars().count());
                RelayResponse::reply(persona.post_process.apply(text.to_string()))
            }
            None => {
                let finish_reason = parsed
                    .candidates
                    .first()
                    .and_then(|c| c.finish_reason.as_deref());
                warn!("Upstream response carried no candidate text (finish reason: {finish_reason:?})");
                RelayResponse::reply(self.fallback_reply.clone())
            }
        }
    }

    fn handle_failure_status(&self, response: &UpstreamResponse) -> RelayResponse {
        let excerpt: String = response
            .body
            .chars()
            .take(self.error_excerpt_chars)
            .collect();
        error!("Upstream returned {}: {}", response.status, excerpt);

        let category = describe_status(response.status);
        let message = if excerpt.trim().is_empty() {
            category.to_string()
        } else {
            format!("{category} Details: {excerpt}")
        };
        let status =
            StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
        RelayResponse::error(status, message)
    }
}

/// Fixed human-readable message for an upstream error status
pub fn describe_status(status: u16) -> &'static str {
    match status {
        429 => "Rate limit reached. Please wait a moment and try again.",
        400 => "The request to the language model was invalid.",
        404 => "The configured language model was not found.",
        _ => "The language model service returned an error.",
    }
}
