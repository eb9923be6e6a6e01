//! Tool System
//!
//! Tools are the unit of capability an agent exposes to the completion
//! service. Each agent owns a [`ToolRegistry`] built once at construction;
//! the dispatch pipeline resolves tool calls against it by name.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{AgentError, Result};

/// Name of the self-registered transfer tool
pub const TRANSFER_TOOL: &str = "transfer_to_agent";

/// Name of the terminal tool that ends a turn
pub const FINAL_ANSWER_TOOL: &str = "final_answer";

/// Parsed tool call arguments
pub type ToolArgs = Map<String, Value>;

/// What a tool produced
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    /// Plain result, rendered into the tool-role message
    Value(Value),

    /// Hand control to the agent with this id
    Transfer(String),
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Value(Value::String(text.into()))
    }

    pub fn transfer(agent_id: impl Into<String>) -> Self {
        Self::Transfer(agent_id.into())
    }

    /// Text placed in the tool-role message: strings verbatim, anything else
    /// as compact JSON. A transfer renders as its target id for display only;
    /// dispatch replaces it with the transfer outcome.
    pub fn render(&self) -> String {
        match self {
            Self::Value(Value::String(s)) | Self::Transfer(s) => s.clone(),
            Self::Value(other) => other.to_string(),
        }
    }
}

/// Invocation-scoped view handed to every tool
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Agent that owns the tool being invoked
    pub agent_id: String,

    /// Id of the tool call being answered
    pub call_id: String,

    /// Conversation-wide shared state
    pub context: Arc<Context>,
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Element type for array parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
}

impl ParameterSchema {
    /// Required parameter of the given JSON type
    pub fn new(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
            items: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, "string", description)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, "number", description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, "integer", description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, "boolean", description)
    }

    pub fn object(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, "object", description)
    }

    pub fn array(name: impl Into<String>, items: impl Into<String>, description: impl Into<String>) -> Self {
        let mut param = Self::new(name, "array", description);
        param.items = Some(items.into());
        param
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Optional parameter with a default value
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = Some(values.into_iter().collect());
        self
    }
}

/// Declared tool contract
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier within an agent
    pub name: String,

    /// Human-readable description (shown to the model)
    #[serde(default)]
    pub description: String,

    /// Declared parameters, in discovery order
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,

    /// Sample argument object; when present, parameter types are inferred
    /// from it instead of the declared list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_input: Option<Map<String, Value>>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Append a declared parameter
    #[must_use]
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    /// Positional-style contract: one required string parameter per name
    #[must_use]
    pub fn positional<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            let description = format!("Description for parameter: {name}.");
            self.parameters.push(ParameterSchema::string(name, description));
        }
        self
    }

    /// Seed the schema from a sample argument object. Non-object values are
    /// ignored.
    #[must_use]
    pub fn sample_input(mut self, sample: Value) -> Self {
        if let Value::Object(map) = sample {
            self.sample_input = Some(map);
        }
        self
    }

    /// Names of required parameters, honoring the sample input when present
    pub fn required_names(&self) -> Vec<&str> {
        match &self.sample_input {
            Some(sample) => sample
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k.as_str())
                .collect(),
            None => self
                .parameters
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.as_str())
                .collect(),
        }
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's declared contract
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with parsed arguments
    async fn execute(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput>;

    /// Validate arguments before execution
    fn validate(&self, args: &ToolArgs) -> Result<()> {
        let schema = self.schema();

        for name in schema.required_names() {
            if !args.contains_key(name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {name}"
                )));
            }
        }

        Ok(())
    }
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolOutput>> + Send>>;
type ToolHandler = dyn Fn(ToolArgs, ToolContext) -> ToolFuture + Send + Sync;

/// Closure-backed tool
pub struct FnTool {
    schema: ToolSchema,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(ToolArgs, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.schema.name)
            .finish_non_exhaustive()
    }
}

/// Ordered registry of an agent's tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<(String, Arc<dyn Tool>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool. A tool with the same name is replaced in place.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if let Some(slot) = self.tools.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = tool;
        } else {
            self.tools.push((name, tool));
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| Arc::clone(t))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|(n, _)| n == name)
    }

    /// All tool schemas, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|(_, t)| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter().map(|(_, t)| t)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Hands the conversation to another agent
pub struct TransferTool;

#[async_trait]
impl Tool for TransferTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(TRANSFER_TOOL, "Transfer to an agent.").param(ParameterSchema::string(
            "agent_id",
            "Id of the agent that should take over the conversation",
        ))
    }

    async fn execute(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutput> {
        let agent_id = args
            .get("agent_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolValidation("agent_id must be a string".into()))?;

        Ok(ToolOutput::transfer(agent_id))
    }
}

/// Ends the turn with a message for the user
pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            FINAL_ANSWER_TOOL,
            "Deliver the final answer to the user, or ask the user for missing information.",
        )
        .param(ParameterSchema::string(
            "answer",
            "The message shown to the user",
        ))
    }

    async fn execute(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutput> {
        match args.get("answer") {
            Some(answer) => Ok(ToolOutput::Value(answer.clone())),
            None => Err(AgentError::ToolValidation("Missing answer".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ToolContext {
        ToolContext {
            agent_id: "a".into(),
            call_id: "call_1".into(),
            context: Arc::new(Context::new(Vec::new(), false)),
        }
    }

    fn args(value: Value) -> ToolArgs {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(TransferTool);
        registry.register(FinalAnswerTool);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec![TRANSFER_TOOL, FINAL_ANSWER_TOOL]);
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(FinalAnswerTool);
        registry.register(FnTool::new(
            ToolSchema::new(FINAL_ANSWER_TOOL, "custom"),
            |_, _| async { Ok(ToolOutput::text("x")) },
        ));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.schemas()[0].description, "custom");
    }

    #[test]
    fn test_validate_required() {
        let tool = TransferTool;
        assert!(tool.validate(&args(json!({"agent_id": "b"}))).is_ok());
        assert!(matches!(
            tool.validate(&ToolArgs::new()),
            Err(AgentError::ToolValidation(_))
        ));
    }

    #[test]
    fn test_sample_input_drives_required() {
        let schema = ToolSchema::new("search", "")
            .sample_input(json!({"query": "cats", "limit": null}));
        assert_eq!(schema.required_names(), vec!["query"]);
    }

    #[tokio::test]
    async fn test_transfer_tool_output() {
        let out = TransferTool
            .execute(&args(json!({"agent_id": "VideoAgent"})), &ctx())
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::transfer("VideoAgent"));
    }

    #[tokio::test]
    async fn test_fn_tool() {
        let tool = FnTool::new(
            ToolSchema::new("echo", "Echo input").positional(["text"]),
            |args, ctx| async move {
                let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
                Ok(ToolOutput::text(format!("{}: {text}", ctx.agent_id)))
            },
        );

        let out = tool.execute(&args(json!({"text": "hi"})), &ctx()).await.unwrap();
        assert_eq!(out.render(), "a: hi");
    }

    #[test]
    fn test_render() {
        assert_eq!(ToolOutput::text("plain").render(), "plain");
        assert_eq!(ToolOutput::Value(json!({"id": 1})).render(), r#"{"id":1}"#);
        assert_eq!(ToolOutput::transfer("StyleAgent").render(), "StyleAgent");
    }
}
