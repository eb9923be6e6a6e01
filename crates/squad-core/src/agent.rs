//! Agents
//!
//! An agent is a named persona: an id, a task, an instruction produced per
//! turn, and its own tool registry. The transfer tool is registered on every
//! agent at build time; the final-answer tool is added when the conversation
//! requires tool calls.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::tool::{FINAL_ANSWER_TOOL, FinalAnswerTool, Tool, ToolRegistry, TransferTool};

type InstructionFn = dyn Fn(&Agent, &Context) -> String + Send + Sync;

/// Where an agent's per-turn instruction comes from
#[derive(Clone)]
pub enum Instruction {
    /// "The agent with id X is a base agent."
    Default,

    /// Fixed text
    Static(String),

    /// Rendered every turn from the agent and the shared context
    Dynamic(Arc<InstructionFn>),
}

/// A persona with its own instruction and tools
pub struct Agent {
    id: String,
    task: String,
    instruction: Instruction,
    tools: ToolRegistry,
    reasoning: bool,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Tools exposed by this agent
    pub const fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Whether this agent's output is reasoning (e.g. planning) rather than
    /// user-facing content
    pub const fn is_reasoning(&self) -> bool {
        self.reasoning
    }

    /// Instruction for the current turn
    pub fn instruction(&self, ctx: &Context) -> String {
        match &self.instruction {
            Instruction::Default => format!("The agent with id {} is a base agent.", self.id),
            Instruction::Static(text) => text.clone(),
            Instruction::Dynamic(render) => render(self, ctx),
        }
    }

    /// Register the terminal final-answer tool (idempotent)
    pub fn use_final_answer_tool(&mut self) {
        if !self.tools.contains(FINAL_ANSWER_TOOL) {
            self.tools.register(FinalAnswerTool);
        }
    }

    /// "- Tool <id>: <description>" lines for every tool
    pub fn tools_summary(&self) -> String {
        self.tools.schemas().iter().fold(String::new(), |mut acc, schema| {
            let _ = writeln!(acc, "- Tool {}: {}", schema.name, schema.description);
            acc
        })
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("task", &self.task)
            .field("tools", &self.tools)
            .field("reasoning", &self.reasoning)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    id: Option<String>,
    task: String,
    instruction: Instruction,
    tools: ToolRegistry,
    reasoning: bool,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(TransferTool);

        Self {
            id: None,
            task: String::new(),
            instruction: Instruction::Default,
            tools,
            reasoning: false,
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    #[must_use]
    pub fn instruction(mut self, text: impl Into<String>) -> Self {
        self.instruction = Instruction::Static(text.into());
        self
    }

    /// Instruction rendered each turn from the agent and shared context
    #[must_use]
    pub fn instruction_fn<F>(mut self, render: F) -> Self
    where
        F: Fn(&Agent, &Context) -> String + Send + Sync + 'static,
    {
        self.instruction = Instruction::Dynamic(Arc::new(render));
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register_arc(tool);
        self
    }

    #[must_use]
    pub const fn reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AgentError::Config("Agent id is required".into()))?;

        Ok(Agent {
            id,
            task: self.task,
            instruction: self.instruction,
            tools: self.tools,
            reasoning: self.reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{FnTool, ToolOutput, ToolSchema, TRANSFER_TOOL};

    fn ctx() -> Context {
        Context::new(Vec::new(), false)
    }

    #[test]
    fn test_default_instruction() {
        let agent = Agent::builder().id("agent_1").task("task_1").build().unwrap();
        assert_eq!(agent.instruction(&ctx()), "The agent with id agent_1 is a base agent.");
    }

    #[test]
    fn test_transfer_tool_always_first() {
        let agent = Agent::builder()
            .id("agent_1")
            .tool(FnTool::new(ToolSchema::new("ping", "Ping"), |_, _| async {
                Ok(ToolOutput::text("pong"))
            }))
            .build()
            .unwrap();

        assert_eq!(agent.tools().names(), vec![TRANSFER_TOOL, "ping"]);
    }

    #[test]
    fn test_final_answer_tool_is_idempotent() {
        let mut agent = Agent::builder().id("a").build().unwrap();
        agent.use_final_answer_tool();
        agent.use_final_answer_tool();
        assert_eq!(agent.tools().names(), vec![TRANSFER_TOOL, FINAL_ANSWER_TOOL]);
    }

    #[test]
    fn test_dynamic_instruction() {
        let agent = Agent::builder()
            .id("VideoAgent")
            .instruction_fn(|agent, ctx| format!("{} sees {} agents", agent.id(), ctx.agents().len()))
            .build()
            .unwrap();
        assert_eq!(agent.instruction(&ctx()), "VideoAgent sees 0 agents");
    }

    #[test]
    fn test_missing_id_rejected() {
        assert!(matches!(Agent::builder().build(), Err(AgentError::Config(_))));
        assert!(Agent::builder().id("  ").build().is_err());
    }

    #[test]
    fn test_tools_summary() {
        let agent = Agent::builder().id("a").build().unwrap();
        assert_eq!(agent.tools_summary(), "- Tool transfer_to_agent: Transfer to an agent.\n");
    }
}
