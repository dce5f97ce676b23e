use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::request_builder::ChatRequest;
use crate::settings::Settings;

/// Chat-completions endpoint of the local inference server
pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/v1/chat/completions";

/// Reply used when a successful response carries no message content
pub const NO_RESPONSE_FALLBACK: &str = "No response received.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("inference endpoint returned HTTP {0}")]
    HttpStatus(u16),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("response body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),
}

/// Something that can turn a chat request into the assistant's reply text
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Send one request; a single attempt, no retries
    async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError>;
}

#[derive(Debug, Default, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    /// `choices[0].message.content`, when present and non-empty
    fn into_reply(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
    }
}

/// Inference client for an OpenAI-compatible chat-completions endpoint
#[derive(Clone, Debug)]
pub struct HttpInferenceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpInferenceClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Build a client from user settings
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be initialized
    /// (for example when no TLS backend is available).
    pub fn from_settings(settings: &Settings) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: settings.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HttpInferenceClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError> {
        debug!(
            endpoint = %self.endpoint,
            message_count = request.messages.len(),
            payload = ?request,
            "Sending chat completion request"
        );

        // .json() sets Content-Type: application/json
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(ClientError::Transport)?;
        debug!(
            body_len = body.len(),
            body = %String::from_utf8_lossy(&body),
            "Chat completion response received"
        );
        let parsed: CompletionResponse =
            serde_json::from_slice(&body).map_err(ClientError::MalformedBody)?;

        match parsed.into_reply() {
            Some(reply) => Ok(reply),
            None => {
                warn!("Chat completion had no message content, using fallback reply");
                Ok(NO_RESPONSE_FALLBACK.to_string())
            }
        }
    }
}
