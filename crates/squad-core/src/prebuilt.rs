//! Prebuilt agents: the conversation planner and a triage router.

use std::fmt::Write as _;

use crate::agent::Agent;
use crate::error::Result;

/// Id of the planner agent; its output is streamed as reasoning
pub const PLANNER_AGENT_ID: &str = "PlannerAgent";
const PLANNER_TASK: &str = "Create a step-by-step plan to achieve the user's initial task";

pub const TRIAGE_AGENT_ID: &str = "TriageAgent";
const TRIAGE_TASK: &str = "Triage the user to the right agent or tool";

/// Planner that decomposes `initial_task` into steps and hands each step to
/// the agent owning the required tool.
pub fn planner_agent(initial_task: impl Into<String>) -> Result<Agent> {
    let initial_task = initial_task.into();

    Agent::builder()
        .id(PLANNER_AGENT_ID)
        .task(PLANNER_TASK)
        .reasoning(true)
        .instruction_fn(move |_, ctx| {
            let mut tools_list = String::new();
            for agent in ctx.agents() {
                let _ = write!(tools_list, "\n=== Agent {} Tools ===\n{}", agent.id(), agent.tools_summary());
            }

            format!(
                r#"# Planner Agent Role
You are a planning specialist. Create a detailed, executable plan for the user's goal.

## Responsibilities
1. Analyze the user's initial task: "{initial_task}"
2. Break it down into sequential, atomic steps
3. Identify the tools/agents needed for each step

## Planning Guidelines
- Each step must be action oriented ("Do X to achieve Y") and executable by a single agent
- Consider dependencies between steps
- Check that a tool exists for every step

## Available agents and their tools
To use a tool, first transfer with transfer_to_agent(agent_id), then call the tool.
{tools_list}
## Response Protocol
Acknowledge the overall goal, then list numbered steps:
[Step Number]. [Action Description]
    - Tool: [Tool id, if known]
    - Tool parameters: [A, B, C]

To start executing the plan, use transfer_to_agent to switch to the right agent for each step.

## Critical Rules
- ALWAYS call transfer_to_agent(agent_id) before using any tool
- Never execute steps directly
- If information is missing, ask exactly ONE clarifying question
- Include verification steps for complex tasks"#
            )
        })
        .build()
}

/// Router that sends the user to the agent whose task matches the request
pub fn triage_agent<'a>(
    agents: impl IntoIterator<Item = &'a Agent>,
    initial_instruction: impl Into<String>,
) -> Result<Agent> {
    let routes = agents.into_iter().fold(String::new(), |mut acc, agent| {
        let _ = writeln!(
            acc,
            "- For requests about \"{}\", use transfer ID: {}",
            agent.task().to_lowercase(),
            agent.id()
        );
        acc
    });
    let initial_instruction = initial_instruction.into();

    let instruction = format!(
        r#"# Triage Agent Role
You are an intelligent router that directs users to the most appropriate specialized agent.

## Core Function
1. Analyze the user's query to identify intent and requirements
2. Match it to the most specific agent without making assumptions
3. Ask a clarifying question when the request is ambiguous
4. Never answer questions directly; only route or clarify

## Available Specializations
{routes}
## Response Rules
- Exact match: transfer to the agent by its id
- Several possible matches: list at most 3 options and ask which one the user needs
- Unclear request: ask one focused clarifying question
- No match: apologize and ask the user to rephrase

## Initial Guidance
{initial_instruction}"#
    );

    Agent::builder()
        .id(TRIAGE_AGENT_ID)
        .task(TRIAGE_TASK)
        .instruction(instruction)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::context::Context;

    fn specialist(id: &str, task: &str) -> Agent {
        Agent::builder().id(id).task(task).build().unwrap()
    }

    #[test]
    fn test_planner_lists_agents_and_task() {
        let planner = planner_agent("load video 999 and summarize it").unwrap();
        let ctx = Context::new(vec![Arc::new(specialist("VideoAgent", "Video lookup"))], false);

        let text = planner.instruction(&ctx);
        assert!(planner.is_reasoning());
        assert_eq!(planner.id(), PLANNER_AGENT_ID);
        assert!(text.contains("load video 999 and summarize it"));
        assert!(text.contains("=== Agent VideoAgent Tools ==="));
        assert!(text.contains("- Tool transfer_to_agent"));
    }

    #[test]
    fn test_triage_routes() {
        let agents = vec![specialist("CssAgent", "Page Styling"), specialist("VideoAgent", "Video Lookup")];
        let triage = triage_agent(&agents, "Be brief.").unwrap();
        let text = triage.instruction(&Context::new(Vec::new(), false));

        assert!(!triage.is_reasoning());
        assert!(text.contains("For requests about \"page styling\", use transfer ID: CssAgent"));
        assert!(text.contains("use transfer ID: VideoAgent"));
        assert!(text.contains("Be brief."));
    }
}
