//! Agents served by this server

use std::fmt::Write as _;

use chrono::Utc;
use serde_json::{Value, json};
use squad_core::{
    Agent, AgentError, FnTool, ParameterSchema, Result, ToolOutput, ToolSchema, prebuilt::triage_agent,
};

pub const ASSISTANT_AGENT_ID: &str = "AssistantAgent";

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Triage first, then the specialists it routes to
pub fn build_agents() -> Result<Vec<Agent>> {
    let assistant = assistant_agent()?;
    let triage = triage_agent(
        [&assistant],
        "Greet the user briefly and route them; ask what they need when the request is empty.",
    )?;

    Ok(vec![triage, assistant])
}

fn assistant_agent() -> Result<Agent> {
    Agent::builder()
        .id(ASSISTANT_AGENT_ID)
        .task("General questions, explanations and the current date or time")
        .instruction(
            "You are a helpful general assistant. Answer clearly and concisely. \
             Use the current_time tool whenever the answer depends on today's date or the time.",
        )
        .tool(current_time_tool())
        .build()
}

fn current_time_tool() -> FnTool {
    FnTool::new(
        ToolSchema::new("current_time", "Get the current date and time in UTC").param(
            ParameterSchema::string("format", "strftime format string, e.g. %Y-%m-%d")
                .optional()
                .with_default(json!(DEFAULT_TIME_FORMAT)),
        ),
        |args, _| async move {
            let format = args.get("format").and_then(Value::as_str).unwrap_or(DEFAULT_TIME_FORMAT);

            let mut now = String::new();
            write!(now, "{}", Utc::now().format(format))
                .map_err(|_| AgentError::ToolValidation(format!("Invalid time format: {format}")))?;

            Ok(ToolOutput::text(now))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use squad_core::tool::{TRANSFER_TOOL, Tool, ToolArgs, ToolContext};
    use squad_core::{Context, prebuilt::TRIAGE_AGENT_ID};
    use std::sync::Arc;

    fn tool_ctx() -> ToolContext {
        ToolContext {
            agent_id: ASSISTANT_AGENT_ID.into(),
            call_id: "call_1".into(),
            context: Arc::new(Context::new(Vec::new(), false)),
        }
    }

    #[test]
    fn test_triage_comes_first() {
        let agents = build_agents().unwrap();
        assert_eq!(agents[0].id(), TRIAGE_AGENT_ID);
        assert_eq!(agents[1].tools().names(), vec![TRANSFER_TOOL, "current_time"]);

        let routes = agents[0].instruction(&Context::new(Vec::new(), false));
        assert!(routes.contains("use transfer ID: AssistantAgent"));
    }

    #[tokio::test]
    async fn test_current_time_format() {
        let tool = current_time_tool();
        let mut args = ToolArgs::new();
        args.insert("format".into(), json!("%Y"));

        let output = tool.execute(&args, &tool_ctx()).await.unwrap();
        assert_eq!(output.render(), Utc::now().format("%Y").to_string());
    }

    #[tokio::test]
    async fn test_current_time_default_format() {
        let output = current_time_tool().execute(&ToolArgs::new(), &tool_ctx()).await.unwrap();
        assert!(output.render().ends_with(" UTC"));
    }
}
