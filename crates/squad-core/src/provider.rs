//! Completion Transport
//!
//! Defines the seam between the orchestrator and the external completion
//! service. The service is a black box: it takes the running transcript plus
//! tool descriptors and returns the next assistant message, either in one
//! piece or as a stream of incremental events.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use squad_core::provider::{CompletionRequest, LlmProvider};
//!
//! let provider = HttpTransport::from_env()?;
//! let message = provider.complete(&request).await?;
//! ```

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, ToolCallRequest};
use crate::schema::FunctionDescriptor;

/// Model selection forwarded to the completion service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Backend family (e.g., "openai")
    #[serde(rename = "llm", default = "default_llm_name")]
    pub llm_name: String,

    /// Model identifier (e.g., "gpt-4.1")
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_llm_name() -> String { "openai".into() }
fn default_model() -> String { "gpt-4.1".into() }
const fn default_temperature() -> f32 { 0.7 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            llm_name: default_llm_name(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

/// One call to the completion service
#[derive(Clone, Debug, Serialize)]
pub struct CompletionRequest {
    /// Transcript plus the current agent instruction as the last message
    pub messages: Vec<Message>,

    /// Tool descriptors of the current agent
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionDescriptor>,

    #[serde(flatten)]
    pub options: GenerationOptions,
}

/// Reason for completion finishing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    #[serde(other)]
    Other,
}

/// Incremental event of a streamed completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text delta
    Content { content: String },

    /// Tool call fragment, keyed by its id
    ToolCall { tool_call: ToolCallRequest },

    /// Terminal event; final values supersede anything accumulated
    Finish {
        #[serde(default)]
        final_content: Option<String>,
        #[serde(default)]
        final_tool_calls: Option<Vec<ToolCallRequest>>,
        #[serde(default)]
        finish_reason: Option<FinishReason>,
    },

    /// Service-side failure; aborts the stream
    Error { error: String },

    /// Any event type this version does not understand
    #[serde(other)]
    Unknown,
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Strategy trait for completion services
///
/// Implement this trait to plug in a different backend. The orchestrator
/// works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Blocking request/response completion
    async fn complete(&self, request: &CompletionRequest) -> Result<Message>;

    /// Streaming completion
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.model, "gpt-4.1");
        assert_eq!(opts.llm_name, "openai");
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
            options: GenerationOptions::default(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("tools").is_none());
        assert_eq!(body["llm"], json!("openai"));
        assert_eq!(body["messages"][0]["role"], json!("user"));
    }

    #[test]
    fn test_stream_event_decoding() {
        let content: StreamEvent = serde_json::from_value(json!({"type": "content", "content": "He"})).unwrap();
        assert_eq!(content, StreamEvent::Content { content: "He".into() });

        let finish: StreamEvent = serde_json::from_value(json!({
            "type": "finish",
            "final_content": "Hello",
            "finish_reason": "stop"
        }))
        .unwrap();
        assert!(matches!(
            finish,
            StreamEvent::Finish { final_content: Some(ref c), final_tool_calls: None, finish_reason: Some(FinishReason::Stop) } if c == "Hello"
        ));

        let unknown: StreamEvent = serde_json::from_value(json!({"type": "usage", "tokens": 3})).unwrap();
        assert_eq!(unknown, StreamEvent::Unknown);
    }
}
