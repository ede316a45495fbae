use std::time::Duration;

use clap::Parser;
use persona_relay::relay::{AskRequest, ReplyEnvelope};

use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, truncate_string};

pub const DEFAULT_URL: &str = "http://127.0.0.1:3000/api/ask";

/// How much of an unexpected response body ends up in the error message
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Parser)]
pub struct AskCommand {
    #[clap(help = "Message to send to the relay")]
    pub message: String,

    #[clap(long, help = "Persona context (hospital, jester, hint, quiz)")]
    pub context: Option<String>,

    #[clap(long, help = "Legacy persona mode (tip, joke, generate)")]
    pub mode: Option<String>,

    #[clap(long, short = 'u', default_value = DEFAULT_URL, help = "Relay endpoint URL")]
    pub url: String,

    #[clap(long, default_value_t = 60, help = "Request timeout in seconds")]
    pub timeout: u64,
}

impl AskCommand {
    pub fn request(&self) -> AskRequest {
        AskRequest {
            message: Some(self.message.clone()),
            mode: self.mode.clone(),
            context: self.context.clone(),
        }
    }

    pub async fn execute(&self, format: OutputFormat) -> CliResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout))
            .build()?;

        let (status, envelope) = send_ask(&client, &self.url, &self.request()).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            }
            OutputFormat::Table => {
                if let ReplyEnvelope::Reply(text) = &envelope {
                    println!("{text}");
                }
            }
        }

        match envelope {
            ReplyEnvelope::Reply(_) => Ok(()),
            ReplyEnvelope::Error(message) => {
                Err(CliError(format!("Relay answered {status}: {message}")))
            }
        }
    }
}

/// POST one request to the relay and decode its envelope
pub async fn send_ask(
    client: &reqwest::Client,
    url: &str,
    request: &AskRequest,
) -> CliResult<(u16, ReplyEnvelope)> {
    tracing::debug!("POST {url}");

    let response = client.post(url).json(request).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;

    let envelope = serde_json::from_str::<ReplyEnvelope>(&body).map_err(|_| {
        CliError(format!(
            "Unexpected response ({status}): {}",
            truncate_string(&body, BODY_EXCERPT_CHARS)
        ))
    })?;

    Ok((status, envelope))
}
