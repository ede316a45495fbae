//! Gemini `generateContent` wire types
//!
//! Response types are lenient: every field is optional so a structurally
//! incomplete body still deserializes and can fall back to placeholder text.
//! The embedded `error` object is read from the raw JSON on its own, so a
//! malformed candidate list never hides it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
}

impl GenerateContentRequest {
    /// Single-turn request carrying one user text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart { text: text.into() }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestContent {
    pub role: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestPart {
    pub text: String,
}

/// Response body from `generateContent`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<Candidate>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Candidate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Candidate>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, if present
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Error object embedded in a Gemini response body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiError {
    /// Numeric HTTP code or a symbolic one, as sent
    pub code: Option<Value>,
    pub message: Option<String>,
    pub status: Option<String>,
}

impl ApiError {
    /// The `error` member of a response body, whatever shape the rest of the body has
    ///
    /// A bare string or other scalar becomes the message.
    pub fn from_body(body: &Value) -> Option<Self> {
        match body.get("error")? {
            Value::Null => None,
            Value::Object(fields) => Some(Self {
                code: fields.get("code").filter(|c| !c.is_null()).cloned(),
                message: fields.get("message").and_then(Value::as_str).map(str::to_string),
                status: fields.get("status").and_then(Value::as_str).map(str::to_string),
            }),
            Value::String(message) => Some(Self {
                message: Some(message.clone()),
                ..Self::default()
            }),
            other => Some(Self {
                message: Some(other.to_string()),
                ..Self::default()
            }),
        }
    }

    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.status.clone())
            .unwrap_or_else(|| "Upstream reported an error".to_string())
    }
}
