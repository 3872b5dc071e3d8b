use crate::error::ServiceError;
use crate::models::ChatRole;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

// Alias for the stream of content deltas a streaming request yields
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ServiceError>> + Send>>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CompletionMessage {
    pub role: ChatRole,
    pub content: String,
}

impl CompletionMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One request to the completion service.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<CompletionMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask for a server-sent event stream instead of a single JSON body.
    pub stream: bool,
}

// The capability the coaching components need from a hosted model
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the full assistant reply for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

// --- OpenAI Compatible Provider Implementation ---

#[derive(Serialize, Debug)]
struct OpenAIRequestBody<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize, Debug)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

// Response structure for STREAMING chunks
#[derive(Deserialize, Debug)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

/// Talks to any `/chat/completions` endpoint in the OpenAI wire format (Groq by default).
pub struct OpenAICompatibleProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAICompatibleProvider {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, request: &CompletionRequest) -> Result<reqwest::Response, ServiceError> {
        let request_url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        let body = OpenAIRequestBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: 1.0,
            stream: request.stream,
        };

        let response = self
            .client
            .post(&request_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<Failed to read error body>".to_string());
            log::error!("Completion request failed with status {}: {}", status, error_body);
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: error_body,
            });
        }
        Ok(response)
    }

    async fn send_chat_request(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        log::info!("Sending request to {} using model: {}", self.api_url, self.model);
        let response = self.post(request).await?;
        let parsed: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::Decode("response carried no choices".to_string()))
    }

    /// Starts a streaming request and returns the content deltas as they arrive.
    pub async fn send_chat_stream_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<DeltaStream, ServiceError> {
        log::info!("Sending STREAM request to {} using model: {}", self.api_url, self.model);
        let response = self.post(request).await?;

        let delta_stream = response
            .bytes_stream()
            .eventsource()
            .map(|event_result| -> Result<Option<String>, ServiceError> {
                let event = event_result.map_err(|e| ServiceError::Stream(e.to_string()))?;
                parse_stream_event(event.data.trim())
            })
            .filter_map(|result| async move {
                match result {
                    Ok(Some(content)) => Some(Ok(content)),
                    Ok(None) => None,
                    Err(e) => {
                        log::error!("Error processing stream chunk: {}", e);
                        Some(Err(e))
                    }
                }
            });

        Ok(Box::pin(delta_stream))
    }
}

// Maps one SSE payload to its content delta; `None` for events without content.
fn parse_stream_event(data: &str) -> Result<Option<String>, ServiceError> {
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)),
        Err(e) => match serde_json::from_str::<serde_json::Value>(data) {
            Ok(value) if value.get("type").and_then(|t| t.as_str()) == Some("ping") => {
                log::debug!("Received stream ping event, skipping.");
                Ok(None)
            }
            _ => {
                log::warn!("Failed to parse stream chunk: {} - Data: {}", e, data);
                Err(ServiceError::Stream(format!("unparsable chunk: {data}")))
            }
        },
    }
}

#[async_trait]
impl CompletionService for OpenAICompatibleProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        if !request.stream {
            return self.send_chat_request(request).await;
        }

        let mut deltas = self.send_chat_stream_request(request).await?;
        let mut full_content = String::new();
        while let Some(delta) = deltas.next().await {
            full_content.push_str(&delta?);
        }
        log::debug!("Stream finished with {} chars", full_content.len());
        Ok(full_content)
    }
}
