//! Tool Dispatch Pipeline
//!
//! Executes the tool calls of one assistant message against the current
//! agent. Calls run strictly in order because a transfer earlier in the
//! batch changes which agent later calls resolve against. Every failure is
//! turned into a tool-role message; nothing here aborts the conversation.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::agent::Agent;
use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::message::{Message, ToolCallRequest};
use crate::tool::{FINAL_ANSWER_TOOL, TRANSFER_TOOL, ToolContext, ToolOutput};

/// Anti-loop guard: last tool invoked by each agent
#[derive(Clone, Debug, Default)]
pub struct ToolCallHistory {
    last: HashMap<String, String>,
}

impl ToolCallHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, agent_id: &str, tool: &str) {
        self.last.insert(agent_id.to_string(), tool.to_string());
    }

    pub fn last_for(&self, agent_id: &str) -> Option<&str> {
        self.last.get(agent_id).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Result of dispatching one batch
#[derive(Debug)]
pub struct DispatchOutcome {
    /// One tool-role message per call, in call order
    pub messages: Vec<Message>,

    /// Agent current after the batch (changed by a transfer)
    pub agent: Arc<Agent>,

    /// Answer of the first final-answer call that completed
    pub answer: Option<String>,
}

/// Side effect of one call besides its message
enum CallEffect {
    None,
    Transfer(Arc<Agent>),
    Answer,
}

/// Executes tool-call batches and tracks repeated calls
#[derive(Debug, Default)]
pub struct ToolDispatcher {
    history: ToolCallHistory,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn history(&self) -> &ToolCallHistory {
        &self.history
    }

    /// Forget every recorded call
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Run `calls` in order starting from `agent`
    pub async fn execute_tool_calls(
        &mut self,
        calls: &[ToolCallRequest],
        agent: Arc<Agent>,
        ctx: &Arc<Context>,
    ) -> DispatchOutcome {
        let mut current = agent;
        let mut messages = Vec::with_capacity(calls.len());
        let mut answer = None;

        for call in calls {
            let (message, effect) = self.execute_one(call, &current, ctx).await;
            match effect {
                CallEffect::Transfer(next) => current = next,
                CallEffect::Answer if answer.is_none() => answer = Some(message.content.clone()),
                CallEffect::Answer | CallEffect::None => {}
            }
            messages.push(message);
        }

        DispatchOutcome {
            messages,
            agent: current,
            answer,
        }
    }

    async fn execute_one(
        &mut self,
        call: &ToolCallRequest,
        agent: &Arc<Agent>,
        ctx: &Arc<Context>,
    ) -> (Message, CallEffect) {
        let name = call.name();

        if self.is_repeated(agent.id(), name) {
            tracing::warn!(agent = agent.id(), tool = name, "Skipping repeated tool call");
            return (
                Message::tool(&call.id, repeated_call_message(agent.id(), name)),
                CallEffect::None,
            );
        }

        let result = invoke(call, agent, ctx).await;
        self.history.record(agent.id(), name);

        let handled = match result {
            Ok(ToolOutput::Value(value)) => {
                tracing::debug!(agent = agent.id(), tool = name, "Tool executed");
                let effect = if name == FINAL_ANSWER_TOOL {
                    CallEffect::Answer
                } else {
                    CallEffect::None
                };
                Ok((Message::tool(&call.id, ToolOutput::Value(value).render()), effect))
            }
            Ok(ToolOutput::Transfer(target)) => transfer(call, agent, ctx, &target),
            Err(err) => Err(err),
        };

        handled.unwrap_or_else(|err| {
            tracing::warn!(agent = agent.id(), tool = name, error = %err, "Tool call failed");
            (
                Message::tool(&call.id, failure_message(call, agent, ctx, &err)),
                CallEffect::None,
            )
        })
    }

    fn is_repeated(&self, agent_id: &str, tool: &str) -> bool {
        if tool == TRANSFER_TOOL || tool == FINAL_ANSWER_TOOL {
            return false;
        }
        self.history.last_for(agent_id) == Some(tool)
    }
}

async fn invoke(call: &ToolCallRequest, agent: &Agent, ctx: &Arc<Context>) -> Result<ToolOutput> {
    let tool = agent
        .tools()
        .get(call.name())
        .ok_or_else(|| AgentError::ToolNotFound(call.name().to_string()))?;

    let args = call.parse_arguments()?;
    tool.validate(&args)?;

    let tool_ctx = ToolContext {
        agent_id: agent.id().to_string(),
        call_id: call.id.clone(),
        context: Arc::clone(ctx),
    };

    AssertUnwindSafe(tool.execute(&args, &tool_ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(AgentError::ToolExecution(panic_text(&*panic))))
}

fn transfer(
    call: &ToolCallRequest,
    agent: &Arc<Agent>,
    ctx: &Context,
    target: &str,
) -> Result<(Message, CallEffect)> {
    if target == agent.id() {
        tracing::warn!(agent = agent.id(), "Rejected self-transfer");
        let text = format!(
            "You are already agent {target}. Transferring to yourself is not allowed; continue with your own tools or transfer to a different agent."
        );
        return Ok((Message::tool(&call.id, text), CallEffect::None));
    }

    let next = ctx
        .agent(target)
        .ok_or_else(|| AgentError::AgentNotFound(target.to_string()))?;

    tracing::info!(from = agent.id(), to = next.id(), "Transferred agent");
    let text = format!("Transferred to {}. Adopt persona immediately.", next.id());
    Ok((Message::tool(&call.id, text), CallEffect::Transfer(next)))
}

fn repeated_call_message(agent_id: &str, tool: &str) -> String {
    format!(
        "Tool {tool} was already the last tool called by agent {agent_id}. Avoid repeating the same call: use the result you already have, call a different tool, or finish."
    )
}

fn failure_message(call: &ToolCallRequest, agent: &Agent, ctx: &Context, err: &AgentError) -> String {
    let name = call.name();
    match err {
        AgentError::AgentNotFound(target) => format!(
            "Agent {target} was not found. Available agents: {}.",
            ctx.agent_ids().join(", ")
        ),
        AgentError::ToolNotFound(_) => format!(
            "Tool id {} with function name {name} was not found at current agent {}.",
            call.id,
            agent.id()
        ),
        AgentError::ArgumentParse(detail) => format!(
            "Failed to parse tool arguments for function {name}: {detail}. Arguments must be a valid JSON object."
        ),
        AgentError::ToolValidation(detail) => {
            format!("Invalid arguments for function {name}: {detail}")
        }
        AgentError::ToolExecution(detail) | AgentError::Other(detail) => {
            format!("Error executing tool: {detail}")
        }
        other => format!("Error executing tool: {other}"),
    }
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(|| "tool panicked".into(), |msg| format!("tool panicked: {msg}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    use crate::message::Role;
    use crate::tool::{FnTool, ParameterSchema, ToolSchema};

    fn video_agent() -> Agent {
        Agent::builder()
            .id("VideoAgent")
            .task("Video lookup")
            .tool(FnTool::new(
                ToolSchema::new("get_video_info", "Load video metadata")
                    .param(ParameterSchema::string("video_id", "Video id")),
                |args, tool_ctx| async move {
                    let id = args.get("video_id").and_then(Value::as_str).unwrap_or_default().to_string();
                    if id == "missing" {
                        return Err(AgentError::ToolExecution("Test error".into()));
                    }
                    if id == "panic" {
                        panic!("decoder exploded");
                    }
                    let video = json!({"id": id, "title": "Demo"});
                    tool_ctx.context.set("video", video.clone()).await;
                    Ok(ToolOutput::Value(video))
                },
            ))
            .tool(FnTool::new(ToolSchema::new("ping", "Ping"), |_, _| async { Ok(ToolOutput::text("pong")) }))
            .build()
            .unwrap()
    }

    fn setup() -> (Arc<Context>, Arc<Agent>, Arc<Agent>) {
        let video = Arc::new(video_agent());
        let other = Arc::new(Agent::builder().id("StyleAgent").task("Styling").build().unwrap());
        let ctx = Arc::new(Context::new(vec![Arc::clone(&video), Arc::clone(&other)], false));
        (ctx, video, other)
    }

    fn call(id: &str, name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, name, args)
    }

    #[tokio::test]
    async fn test_executes_and_populates_context() {
        let (ctx, video, _) = setup();
        let mut dispatcher = ToolDispatcher::new();

        let outcome = dispatcher
            .execute_tool_calls(&[call("c1", "get_video_info", r#"{"video_id":"999"}"#)], video, &ctx)
            .await;

        assert_eq!(outcome.messages.len(), 1);
        let msg = &outcome.messages[0];
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(serde_json::from_str::<Value>(&msg.content).unwrap()["id"], json!("999"));
        assert_eq!(ctx.get("video").await.unwrap()["id"], json!("999"));
    }

    #[tokio::test]
    async fn test_messages_match_batch_order() {
        let (ctx, video, _) = setup();
        let mut dispatcher = ToolDispatcher::new();
        let calls = [
            call("a", "ping", "{}"),
            call("b", "nope", "{}"),
            call("c", "get_video_info", "{bad"),
            call("d", "get_video_info", r#"{"video_id":"1"}"#),
        ];

        let outcome = dispatcher.execute_tool_calls(&calls, video, &ctx).await;
        let ids: Vec<_> = outcome.messages.iter().map(|m| m.tool_call_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_id_and_name() {
        let (ctx, video, _) = setup();
        let outcome = ToolDispatcher::new()
            .execute_tool_calls(&[call("call_7", "launch_rocket", "{}")], video, &ctx)
            .await;

        let content = &outcome.messages[0].content;
        assert!(content.contains("call_7"));
        assert!(content.contains("launch_rocket"));
        assert!(content.contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_json_reports_function_name() {
        let (ctx, video, _) = setup();
        let outcome = ToolDispatcher::new()
            .execute_tool_calls(&[call("c1", "get_video_info", "{\"video_id\": ")], video, &ctx)
            .await;

        let content = &outcome.messages[0].content;
        assert!(content.starts_with("Failed to parse tool arguments for function get_video_info"));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let (ctx, video, _) = setup();
        let outcome = ToolDispatcher::new()
            .execute_tool_calls(&[call("c1", "get_video_info", "{}")], video, &ctx)
            .await;
        assert!(outcome.messages[0].content.contains("Missing required parameter: video_id"));
    }

    #[tokio::test]
    async fn test_tool_error_is_contained() {
        let (ctx, video, _) = setup();
        let calls = [
            call("c1", "get_video_info", r#"{"video_id":"missing"}"#),
            call("c2", "ping", "{}"),
        ];
        let outcome = ToolDispatcher::new().execute_tool_calls(&calls, video, &ctx).await;

        assert_eq!(outcome.messages[0].content, "Error executing tool: Test error");
        assert_eq!(outcome.messages[1].content, "pong");
    }

    #[tokio::test]
    async fn test_tool_panic_is_contained() {
        let (ctx, video, _) = setup();
        let outcome = ToolDispatcher::new()
            .execute_tool_calls(&[call("c1", "get_video_info", r#"{"video_id":"panic"}"#)], video, &ctx)
            .await;
        assert_eq!(outcome.messages[0].content, "Error executing tool: tool panicked: decoder exploded");
    }

    #[tokio::test]
    async fn test_transfer_changes_agent_for_rest_of_batch() {
        let (ctx, video, other) = setup();
        let calls = [
            call("t1", TRANSFER_TOOL, r#"{"agent_id":"StyleAgent"}"#),
            call("c2", "ping", "{}"),
        ];

        let outcome = ToolDispatcher::new().execute_tool_calls(&calls, video, &ctx).await;
        assert!(Arc::ptr_eq(&outcome.agent, &other));
        assert_eq!(outcome.messages[0].content, "Transferred to StyleAgent. Adopt persona immediately.");
        // StyleAgent has no ping tool
        assert!(outcome.messages[1].content.contains("not found"));
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let (ctx, video, _) = setup();
        let outcome = ToolDispatcher::new()
            .execute_tool_calls(&[call("t1", TRANSFER_TOOL, r#"{"agent_id":"VideoAgent"}"#)], Arc::clone(&video), &ctx)
            .await;

        assert!(Arc::ptr_eq(&outcome.agent, &video));
        assert!(outcome.messages[0].content.contains("Transferring to yourself is not allowed"));
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_agent() {
        let (ctx, video, _) = setup();
        let outcome = ToolDispatcher::new()
            .execute_tool_calls(&[call("t1", TRANSFER_TOOL, r#"{"agent_id":"Ghost"}"#)], Arc::clone(&video), &ctx)
            .await;

        assert!(Arc::ptr_eq(&outcome.agent, &video));
        assert_eq!(
            outcome.messages[0].content,
            "Agent Ghost was not found. Available agents: VideoAgent, StyleAgent."
        );
    }

    #[tokio::test]
    async fn test_repeated_call_is_guarded() {
        let (ctx, video, _) = setup();
        let mut dispatcher = ToolDispatcher::new();

        let first = dispatcher
            .execute_tool_calls(&[call("c1", "ping", "{}")], Arc::clone(&video), &ctx)
            .await;
        let second = dispatcher
            .execute_tool_calls(&[call("c2", "ping", "{}")], Arc::clone(&video), &ctx)
            .await;

        assert_eq!(first.messages[0].content, "pong");
        assert!(second.messages[0].content.contains("Avoid repeating the same call"));
        assert_eq!(dispatcher.history().last_for("VideoAgent"), Some("ping"));

        dispatcher.clear_history();
        let third = dispatcher
            .execute_tool_calls(&[call("c3", "ping", "{}")], video, &ctx)
            .await;
        assert_eq!(third.messages[0].content, "pong");
    }

    #[tokio::test]
    async fn test_guard_is_per_agent() {
        let (ctx, video, _) = setup();
        let other_video = Arc::new(
            Agent::builder()
                .id("OtherVideo")
                .tool(FnTool::new(ToolSchema::new("ping", "Ping"), |_, _| async { Ok(ToolOutput::text("pong")) }))
                .build()
                .unwrap(),
        );
        let mut dispatcher = ToolDispatcher::new();

        dispatcher.execute_tool_calls(&[call("c1", "ping", "{}")], video, &ctx).await;
        let outcome = dispatcher
            .execute_tool_calls(&[call("c2", "ping", "{}")], other_video, &ctx)
            .await;
        assert_eq!(outcome.messages[0].content, "pong");
    }

    #[tokio::test]
    async fn test_consecutive_transfers_never_guarded() {
        let (ctx, video, other) = setup();
        let mut dispatcher = ToolDispatcher::new();

        let first = dispatcher
            .execute_tool_calls(&[call("t1", TRANSFER_TOOL, r#"{"agent_id":"Ghost"}"#)], Arc::clone(&video), &ctx)
            .await;
        let second = dispatcher
            .execute_tool_calls(&[call("t2", TRANSFER_TOOL, r#"{"agent_id":"StyleAgent"}"#)], video, &ctx)
            .await;

        assert!(first.messages[0].content.contains("not found"));
        assert!(Arc::ptr_eq(&second.agent, &other));
    }

    #[tokio::test]
    async fn test_guarded_call_not_recorded() {
        let (ctx, video, _) = setup();
        let mut dispatcher = ToolDispatcher::new();
        let calls = [
            call("c1", "ping", "{}"),
            call("c2", "ping", "{}"),
            call("c3", "get_video_info", r#"{"video_id":"5"}"#),
            call("c4", "ping", "{}"),
        ];

        let outcome = dispatcher.execute_tool_calls(&calls, video, &ctx).await;
        assert_eq!(outcome.messages[0].content, "pong");
        assert!(outcome.messages[1].content.contains("Avoid repeating"));
        assert_eq!(outcome.messages[3].content, "pong");
    }

    #[tokio::test]
    async fn test_answer_only_from_completed_final_answer() {
        let mut agent = video_agent();
        agent.use_final_answer_tool();
        let agent = Arc::new(agent);
        let ctx = Arc::new(Context::new(vec![Arc::clone(&agent)], false));
        let mut dispatcher = ToolDispatcher::new();

        let broken = dispatcher
            .execute_tool_calls(&[call("f1", FINAL_ANSWER_TOOL, "{\"answer\": ")], Arc::clone(&agent), &ctx)
            .await;
        assert_eq!(broken.answer, None);
        assert!(broken.messages[0].content.starts_with("Failed to parse tool arguments for function final_answer"));

        let missing = dispatcher
            .execute_tool_calls(&[call("f2", FINAL_ANSWER_TOOL, "{}")], Arc::clone(&agent), &ctx)
            .await;
        assert_eq!(missing.answer, None);

        let done = dispatcher
            .execute_tool_calls(
                &[call("c1", "ping", "{}"), call("f3", FINAL_ANSWER_TOOL, r#"{"answer":"All set"}"#)],
                agent,
                &ctx,
            )
            .await;
        assert_eq!(done.answer.as_deref(), Some("All set"));
    }

    #[tokio::test]
    async fn test_final_answer_unknown_to_agent_is_not_an_answer() {
        let (ctx, video, _) = setup();
        let outcome = ToolDispatcher::new()
            .execute_tool_calls(&[call("f1", FINAL_ANSWER_TOOL, r#"{"answer":"hi"}"#)], video, &ctx)
            .await;

        assert_eq!(outcome.answer, None);
        assert!(outcome.messages[0].content.contains("was not found at current agent VideoAgent"));
    }
}
