//! Inbound request and outbound envelope types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of a relay request; every field is optional
///
/// Fields are read independently: numbers and booleans are taken as their
/// text, and any other non-string value drops only that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

impl AskRequest {
    /// Parse a request body leniently: anything that is not a JSON object becomes an empty request
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        let value = match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => value,
            Ok(other) => {
                tracing::warn!("Request body is not a JSON object, treating as empty: {other}");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!("Unparseable request body, treating as empty: {e}");
                return Self::default();
            }
        };
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("Unreadable request fields, treating as empty: {e}");
            Self::default()
        })
    }
}

/// Every relay response body: `{"ok": true, "reply": ...}` or `{"ok": false, "error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub enum ReplyEnvelope {
    Reply(String),
    Error(String),
}

impl ReplyEnvelope {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyEnvelope::Reply(_))
    }
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ReplyEnvelope> for RawEnvelope {
    fn from(envelope: ReplyEnvelope) -> Self {
        match envelope {
            ReplyEnvelope::Reply(reply) => RawEnvelope {
                ok: true,
                reply: Some(reply),
                error: None,
            },
            ReplyEnvelope::Error(error) => RawEnvelope {
                ok: false,
                reply: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<RawEnvelope> for ReplyEnvelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, String> {
        match (raw.ok, raw.reply, raw.error) {
            (true, Some(reply), _) => Ok(ReplyEnvelope::Reply(reply)),
            (false, _, Some(error)) => Ok(ReplyEnvelope::Error(error)),
            (true, None, _) => Err("envelope has ok=true but no reply".to_string()),
            (false, _, None) => Err("envelope has ok=false but no error".to_string()),
        }
    }
}

/// Status code plus envelope, ready to become an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub envelope: ReplyEnvelope,
}

impl RelayResponse {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: ReplyEnvelope::Reply(text.into()),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope: ReplyEnvelope::Error(message.into()),
        }
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
