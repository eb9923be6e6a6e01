//! HTTP Completion Transport
//!
//! Implementation of `LlmProvider` for the remote completion service.
//!
//! - `POST {api_url}/message` returns `{"message": {...}}`
//! - `POST {api_url}/message/stream` returns server-sent events, one JSON
//!   event per `data:` frame, frames separated by a blank line

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use squad_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{CompletionRequest, CompletionStream, LlmProvider, StreamEvent},
};

const API_TOKEN_HEADER: &str = "x-api-token";

/// Transport configuration
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Base URL of the completion service
    pub api_url: String,

    /// Sent as the `x-api-token` header when set
    pub api_token: Option<String>,

    /// Timeout for blocking completions, in seconds
    pub timeout_secs: u64,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            api_url: "https://spinal.onrender.com/".into(),
            api_token: None,
            timeout_secs: 120,
        }
    }
}

impl HttpTransportConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_url = std::env::var("SQUAD_API_URL").unwrap_or(defaults.api_url);
        let api_token = std::env::var("SQUAD_API_TOKEN").ok().filter(|t| !t.is_empty());
        let timeout_secs = std::env::var("SQUAD_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Self {
            api_url,
            api_token,
            timeout_secs,
        }
    }
}

#[derive(Deserialize)]
struct MessageEnvelope {
    message: Message,
}

/// Completion service client
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(HttpTransportConfig::from_env())
    }

    pub const fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url.trim_end_matches('/'))
    }

    fn post(&self, path: &str, request: &CompletionRequest) -> RequestBuilder {
        let builder = self.client.post(self.endpoint(path)).json(request);
        match &self.config.api_token {
            Some(token) => builder.header(API_TOKEN_HEADER, token),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for HttpTransport {
    async fn complete(&self, request: &CompletionRequest) -> Result<Message> {
        tracing::debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            model = %request.options.model,
            "Sending completion request"
        );

        let response = self
            .post("message", request)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let envelope: MessageEnvelope = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Invalid completion response: {e}")))?;

        Ok(envelope.message)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        tracing::debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            model = %request.options.model,
            "Opening completion stream"
        );

        let response = self
            .post("message/stream", request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let byte_stream = response.bytes_stream();

        // Split on raw bytes; a frame is decoded only once complete
        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AgentError::Stream(format!("Stream connection error: {e}")));
                        return;
                    }
                };

                buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

                while let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
                    let frame: Vec<u8> = buffer.drain(..end + 2).collect();
                    if let Some(event) = decode_frame(&frame) {
                        yield Ok(event);
                    }
                }
            }

            if let Some(event) = decode_frame(&buffer) {
                yield Ok(event);
            }
        };

        Ok(Box::pin(stream))
    }
}

fn decode_frame(frame: &[u8]) -> Option<StreamEvent> {
    match std::str::from_utf8(frame) {
        Ok(frame) => parse_frame(frame),
        Err(e) => Some(StreamEvent::Error {
            error: format!("Invalid UTF-8 in stream frame: {e}"),
        }),
    }
}

/// Decode one SSE frame. Frames without data yield `None`; frames that are
/// not a valid event become an error event.
pub fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let data = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect::<Vec<_>>()
        .join("\n");

    if data.trim().is_empty() || data.trim() == "[DONE]" {
        return None;
    }

    let value: Value = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(data = %data, "Undecodable stream frame");
            return Some(StreamEvent::Error {
                error: format!("Failed to parse stream data: {e}"),
            });
        }
    };

    match value.get("error") {
        Some(Value::Null) | None => {}
        Some(Value::String(error)) => return Some(StreamEvent::Error { error: error.clone() }),
        Some(other) => return Some(StreamEvent::Error { error: other.to_string() }),
    }

    Some(
        serde_json::from_value(value).unwrap_or_else(|e| StreamEvent::Error {
            error: format!("Failed to parse stream data: {e}"),
        }),
    )
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = status.as_u16(), body = %body, "Completion service error");
    Err(status_to_error(status.as_u16(), &body))
}

/// Map a non-success HTTP status to an error
pub fn status_to_error(status: u16, body: &str) -> AgentError {
    match status {
        401 | 403 => AgentError::Auth(body.to_string()),
        429 => AgentError::RateLimited(body.to_string()),
        _ => AgentError::Provider(format!("HTTP {status}: {body}")),
    }
}

fn transport_error(err: reqwest::Error) -> AgentError {
    if err.is_connect() || err.is_timeout() {
        AgentError::ProviderUnavailable(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}
