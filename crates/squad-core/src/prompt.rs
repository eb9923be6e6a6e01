//! Base instructions appended to every agent instruction, plus the fixed
//! texts the orchestrator injects.

/// How the model is allowed to answer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Every reply must be a tool call; `final_answer` ends the turn
    #[default]
    RequireToolCalls,

    /// Plain text replies end the turn
    AllowText,
}

pub const INSTRUCTION_WITH_FINAL_ANSWER: &str = r#"You are an expert assistant who can solve any task using tool calls.
You will be given a task to solve as best you can, using the tools available.

You must always use a tool call to continue your reasoning. Do not output free-form content or questions directly unless a tool returned them.

# Tool Call Guidelines
- Use the "transfer_to_agent" tool to transfer the user to another agent.
- Use the "final_answer" tool when your reasoning is complete and you are ready to reply to the user.
- Use the "final_answer" tool to ask the user for clarification or missing details.

Important:
- Never write questions or answers in the message content. Deliver them through the "final_answer" tool.
- If you need input from the user (for example "Please provide the video ID you want to analyze"), call "final_answer" with that request.

Your reasoning must end with a tool call, not a regular message."#;

pub const INSTRUCTION_WITHOUT_FINAL_ANSWER: &str = r"You are an expert assistant who can solve any task using tool calls when necessary.
You will be given a task to solve as best you can, using the available tools strategically.

# Response Guidelines
- You can reply with direct text for explanations, clarifications and general assistance.
- Use tool calls when you need to perform specific actions, gather information or transfer to other agents.

# Tool Call Guidelines
- Use the transfer tool to hand the user to another agent when specialized help is needed.
- Use tools to search, calculate or retrieve information.

Conclude with a direct text reply once you have what you need.";

/// Injected as a system message when the model replies with text while tool
/// calls are required
pub const CORRECTIVE_INSTRUCTION: &str = "You did not call any tool, nor the 'final_answer' tool. Keep reasoning, and if you want to finish or ask the user for information, call the 'final_answer' tool explicitly.";

/// Answer returned when the step budget runs out
pub const MAX_STEPS_ANSWER: &str = "Max steps reached without a final answer.";

/// Base instruction for a response mode
pub const fn base_instruction(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::RequireToolCalls => INSTRUCTION_WITH_FINAL_ANSWER,
        ResponseMode::AllowText => INSTRUCTION_WITHOUT_FINAL_ANSWER,
    }
}
