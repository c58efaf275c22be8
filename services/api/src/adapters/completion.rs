//! services/api/src/adapters/completion.rs
//!
//! This module contains the adapter for an OpenAI-compatible chat-completions
//! endpoint. It implements the `TextGenerationService` port from the `core` crate.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};
use vocab_reader_core::ports::{CompletionRequest, PortError, PortResult, TextGenerationService};

/// How much of a failing payload is kept for the log.
const LOG_EXCERPT_CHARS: usize = 300;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

fn excerpt(text: &str) -> String {
    text.chars().take(LOG_EXCERPT_CHARS).collect()
}

/// Pulls the first choice's message content out of a decoded response body.
pub fn first_choice_content(body: &Value) -> PortResult<String> {
    body["choices"]
        .get(0)
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or_else(|| PortError::MalformedResponse("response has no message content".to_string()))
}

/// Turns a raw HTTP status and body into the completion text or a port error.
pub fn decode_completion(status: u16, body: &str) -> PortResult<String> {
    if !(200..300).contains(&status) {
        error!("Completion request failed with HTTP {}: {}", status, excerpt(body));
        return Err(PortError::upstream(Some(status), format!("HTTP {}", status)));
    }
    let json: Value = serde_json::from_str(body).map_err(|e| {
        error!("Completion payload is not JSON: {}. Raw: {}", e, excerpt(body));
        PortError::upstream(Some(status), format!("Failed to parse response: {}", e))
    })?;
    first_choice_content(&json).map_err(|e| {
        error!("Completion payload has no content. Raw: {}", excerpt(body));
        e
    })
}

//=========================================================================================
// The Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` over HTTP.
#[derive(Clone)]
pub struct ChatCompletionAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    lookup_model: String,
    rewrite_model: String,
}

impl ChatCompletionAdapter {
    /// Creates a new `ChatCompletionAdapter`. A missing key is not an error here;
    /// every call reports it instead.
    pub fn new(
        api_key: Option<String>,
        api_url: String,
        lookup_model: String,
        rewrite_model: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            api_url,
            lookup_model,
            rewrite_model,
        })
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for ChatCompletionAdapter {
    fn lookup_model(&self) -> &str {
        &self.lookup_model
    }

    fn rewrite_model(&self) -> &str {
        &self.rewrite_model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
        let Some(api_key) = &self.api_key else {
            return Err(PortError::Configuration(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        };

        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            "Sending completion request to {} (model {}, {} prompt chars)",
            self.api_url,
            request.model,
            request.prompt.len()
        );
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request could not be sent: {}", e);
                PortError::upstream(e.status().map(|s| s.as_u16()), e.to_string())
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            error!("Completion response body could not be read: {}", e);
            PortError::upstream(Some(status), e.to_string())
        })?;

        decode_completion(status, &text)
    }
}
