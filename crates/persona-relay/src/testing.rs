//! Test utilities for the relay
//!
//! `ScriptedUpstream` stands in for the real upstream so retry and response
//! handling can be exercised without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::upstream::{Upstream, UpstreamResponse, UpstreamResult};

/// One recorded call to a `ScriptedUpstream`
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_key: String,
    pub prompt: String,
    pub at: Instant,
}

/// Upstream double that replays a fixed sequence of outcomes
///
/// Once the script runs out, the last outcome repeats.
#[derive(Debug)]
pub struct ScriptedUpstream {
    script: Mutex<VecDeque<UpstreamResult>>,
    last: Mutex<UpstreamResult>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedUpstream {
    pub fn new(script: Vec<UpstreamResult>) -> Self {
        let last = script
            .last()
            .cloned()
            .unwrap_or_else(|| Err(TransportError("script is empty".to_string())));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers 200 with `text` as the first candidate
    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(Self::candidate_body(text))])
    }

    /// Always answers with `status` and `body`
    pub fn failing(status: u16, body: &str) -> Self {
        Self::new(vec![Ok(UpstreamResponse::new(status, body))])
    }

    /// A 200 response whose first candidate carries `text`
    pub fn candidate_body(text: &str) -> UpstreamResponse {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        });
        UpstreamResponse::new(200, body.to_string())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.prompt).collect()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.api_key).collect()
    }

    /// Instants at which each call started
    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls().into_iter().map(|c| c.at).collect()
    }

    fn next_outcome(&self) -> UpstreamResult {
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(outcome) => outcome,
            None => self
                .last
                .lock()
                .map(|l| l.clone())
                .unwrap_or_else(|_| Err(TransportError("script lock poisoned".to_string()))),
        }
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn generate(&self, api_key: &str, prompt: &str) -> UpstreamResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                api_key: api_key.to_string(),
                prompt: prompt.to_string(),
                at: Instant::now(),
            });
        }
        self.next_outcome()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_upstream_replays_in_order_then_repeats_last() {
        let upstream = ScriptedUpstream::new(vec![
            Ok(UpstreamResponse::new(429, "slow down")),
            Ok(UpstreamResponse::new(200, "{}")),
        ]);

        assert_eq!(upstream.generate("k", "p").await.unwrap().status, 429);
        assert_eq!(upstream.generate("k", "p").await.unwrap().status, 200);
        assert_eq!(upstream.generate("k", "p").await.unwrap().status, 200);
        assert_eq!(upstream.call_count(), 3);
    }

    #[tokio::test]
    async fn scripted_upstream_records_calls() {
        let upstream = ScriptedUpstream::replying("hi");
        upstream.generate("key-1", "prompt-1").await.unwrap();

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].api_key, "key-1");
        assert_eq!(calls[0].prompt, "prompt-1");
    }

    #[tokio::test]
    async fn empty_script_yields_transport_error() {
        let upstream = ScriptedUpstream::new(Vec::new());
        assert!(upstream.generate("k", "p").await.is_err());
    }
}
