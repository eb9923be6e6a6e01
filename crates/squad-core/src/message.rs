//! Conversation Messages
//!
//! Wire-compatible message format exchanged with the completion service,
//! plus the append-only transcript kept by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// Function name and raw JSON arguments of a tool call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool identifier requested by the model
    pub name: String,

    /// JSON-encoded argument object, exactly as sent by the model
    #[serde(default)]
    pub arguments: String,
}

fn default_call_type() -> String {
    "function".into()
}

/// Tool call request emitted by the completion service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlates the request with its tool-role response
    pub id: String,

    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,

    pub function: FunctionCall,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Requested function name
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Decode the argument string into a JSON object.
    ///
    /// Blank argument strings decode to an empty object since some services
    /// send `""` for parameterless functions.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(AgentError::ArgumentParse(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(AgentError::ArgumentParse(e.to_string())),
        }
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,

    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,

    /// Present only on tool-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Optional name (for multi-user scenarios)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Local creation time, never sent over the wire
    #[serde(skip_serializing, default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool calls. An empty call list is
    /// stored as `None`.
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::assistant(content);
        if !tool_calls.is_empty() {
            msg.tool_calls = Some(tool_calls);
        }
        msg
    }

    /// Create a tool result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Tool calls on this message (empty slice when there are none)
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Whether the message requests at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Estimate token count (rough approximation)
    #[allow(clippy::cast_possible_truncation)]
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token is a rough estimate
        let args: usize = self.tool_calls().iter().map(|c| c.function.arguments.len()).sum();
        ((self.content.len() + args) / 4) as u32 + 4
    }
}

/// Append-only conversation transcript
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages, preserving their order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Estimate total tokens in conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
