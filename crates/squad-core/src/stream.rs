//! Streaming Response Assembly
//!
//! Folds a stream of [`StreamEvent`]s into one assistant [`Message`] while
//! forwarding content deltas to the caller as they arrive.

use std::sync::Arc;

use futures::StreamExt;

use crate::error::{AgentError, Result};
use crate::message::{Message, ToolCallRequest};
use crate::provider::{CompletionStream, StreamEvent};

/// Receives each content delta and whether it comes from a reasoning agent
pub type ContentCallback = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Receives a mid-stream failure before the turn is aborted
pub type ErrorCallback = Arc<dyn Fn(&AgentError) + Send + Sync>;

/// Caller-supplied stream callbacks
#[derive(Clone, Default)]
pub struct StreamHandlers {
    pub on_content: Option<ContentCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl StreamHandlers {
    pub(crate) fn content(&self, delta: &str, is_reasoning: bool) {
        if let Some(cb) = &self.on_content {
            cb(delta, is_reasoning);
        }
    }

    pub(crate) fn error(&self, err: &AgentError) {
        if let Some(cb) = &self.on_error {
            cb(err);
        }
    }
}

impl std::fmt::Debug for StreamHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("on_content", &self.on_content.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Accumulates deltas of one streamed response
#[derive(Debug, Default)]
pub struct StreamAssembler {
    content: String,
    tool_calls: Vec<ToolCallRequest>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_content(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    /// Record a tool call fragment. A fragment with a known id replaces the
    /// earlier one; new ids keep first-seen order.
    pub fn push_tool_call(&mut self, call: ToolCallRequest) {
        match self.tool_calls.iter_mut().find(|c| c.id == call.id) {
            Some(existing) => *existing = call,
            None => self.tool_calls.push(call),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.tool_calls
    }

    /// Build the message from a finish event. Non-empty final content and any
    /// final tool-call list supersede the accumulated values.
    pub fn finish(self, final_content: Option<String>, final_tool_calls: Option<Vec<ToolCallRequest>>) -> Message {
        let content = final_content
            .filter(|c| !c.is_empty())
            .unwrap_or(self.content);
        let tool_calls = final_tool_calls.unwrap_or(self.tool_calls);

        Message::assistant_with_tool_calls(content, tool_calls)
    }

    /// Build the message from accumulated deltas only
    pub fn into_message(self) -> Message {
        Message::assistant_with_tool_calls(self.content, self.tool_calls)
    }
}

/// Drive a completion stream to its end.
///
/// Content deltas go to `handlers.on_content` tagged with `is_reasoning`. An
/// error event or a failed item calls `handlers.on_error` and aborts; the
/// partial response is dropped. A stream that ends without a finish event
/// yields what was accumulated.
pub async fn assemble(mut stream: CompletionStream, handlers: &StreamHandlers, is_reasoning: bool) -> Result<Message> {
    let mut assembler = StreamAssembler::new();

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(error = %err, "Completion stream failed");
                handlers.error(&err);
                return Err(err);
            }
        };

        match event {
            StreamEvent::Content { content } => {
                handlers.content(&content, is_reasoning);
                assembler.push_content(&content);
            }
            StreamEvent::ToolCall { tool_call } => {
                tracing::debug!(id = %tool_call.id, name = %tool_call.function.name, "Tool call delta");
                assembler.push_tool_call(tool_call);
            }
            StreamEvent::Finish { final_content, final_tool_calls, finish_reason } => {
                tracing::debug!(?finish_reason, "Stream finished");
                return Ok(assembler.finish(final_content, final_tool_calls));
            }
            StreamEvent::Error { error } => {
                let err = AgentError::Stream(error);
                tracing::error!(error = %err, "Completion stream reported an error");
                handlers.error(&err);
                return Err(err);
            }
            StreamEvent::Unknown => {}
        }
    }

    tracing::debug!("Stream ended without a finish event");
    Ok(assembler.into_message())
}
