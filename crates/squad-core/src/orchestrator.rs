//! Conversation Orchestrator
//!
//! The step loop of a conversation. Each step renders the current agent's
//! instruction, asks the completion service for the next assistant message
//! and acts on it:
//!
//! ```text
//!   user message
//!        │
//!        ▼
//!   AwaitingModel ──► final_answer call ──► dispatch ─┬► Done(answer)
//!        │                                           └► failed ──► AwaitingModel
//!        │        ──► tool calls ─────────► dispatch ──► AwaitingModel
//!        │        ──► plain text ─┬─ AllowText ────────► Done(text)
//!        │                        └─ RequireToolCalls ─► corrective ──► AwaitingModel
//!        ▼
//!   step budget spent ──► MaxStepsExceeded(fixed answer)
//! ```
//!
//! Tool failures never leave the loop; transport failures abort the turn.

use std::collections::HashSet;
use std::sync::Arc;

use crate::agent::Agent;
use crate::context::Context;
use crate::dispatch::ToolDispatcher;
use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::prebuilt::planner_agent;
use crate::prompt::{CORRECTIVE_INSTRUCTION, MAX_STEPS_ANSWER, base_instruction};
use crate::provider::{CompletionRequest, GenerationOptions, LlmProvider};
use crate::schema::function_descriptors;
use crate::stream::{ContentCallback, ErrorCallback, StreamHandlers, assemble};

pub use crate::prompt::ResponseMode;

/// Loop configuration
#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorConfig {
    /// Step ceiling; the loop makes at most `max_steps + 1` model calls
    pub max_steps: usize,

    pub mode: ResponseMode,

    /// Model selection forwarded with every request
    pub options: GenerationOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            mode: ResponseMode::RequireToolCalls,
            options: GenerationOptions::default(),
        }
    }
}

/// Per-turn options
#[derive(Clone, Default)]
pub struct TurnOptions {
    /// Hand the turn to the planner agent first
    pub create_planning_task: bool,

    /// Stream the response; receives content deltas and the reasoning flag
    pub stream_callback: Option<ContentCallback>,

    pub error_callback: Option<ErrorCallback>,
}

impl TurnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn planning(mut self, create_planning_task: bool) -> Self {
        self.create_planning_task = create_planning_task;
        self
    }

    #[must_use]
    pub fn on_content<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.stream_callback = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AgentError) + Send + Sync + 'static,
    {
        self.error_callback = Some(Arc::new(callback));
        self
    }

    fn handlers(self) -> StreamHandlers {
        StreamHandlers {
            on_content: self.stream_callback,
            on_error: self.error_callback,
        }
    }
}

impl std::fmt::Debug for TurnOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOptions")
            .field("create_planning_task", &self.create_planning_task)
            .field("stream_callback", &self.stream_callback.is_some())
            .field("error_callback", &self.error_callback.is_some())
            .finish()
    }
}

/// Drives one conversation
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: OrchestratorConfig,
    dispatcher: ToolDispatcher,
    context: Arc<Context>,
    transcript: Conversation,
    current: Arc<Agent>,
    planner: Option<Arc<Agent>>,
}

impl Orchestrator {
    /// Build a conversation over `agents`; the first agent starts the
    /// conversation. In [`ResponseMode::RequireToolCalls`] every agent is
    /// given the final-answer tool.
    pub fn new(agents: Vec<Agent>, provider: Arc<dyn LlmProvider>, config: OrchestratorConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.id().to_string()) {
                return Err(AgentError::Config(format!("Duplicate agent id: {}", agent.id())));
            }
        }

        let require_tools = config.mode == ResponseMode::RequireToolCalls;
        let agents: Vec<Arc<Agent>> = agents
            .into_iter()
            .map(|mut agent| {
                if require_tools {
                    agent.use_final_answer_tool();
                }
                Arc::new(agent)
            })
            .collect();

        let current = agents
            .first()
            .cloned()
            .ok_or_else(|| AgentError::Config("At least one agent is required".into()))?;

        tracing::debug!(agents = agents.len(), mode = ?config.mode, "Orchestrator created");

        Ok(Self {
            provider,
            context: Arc::new(Context::new(agents, !require_tools)),
            config,
            dispatcher: ToolDispatcher::new(),
            transcript: Conversation::new(),
            current,
            planner: None,
        })
    }

    pub const fn current_agent(&self) -> &Arc<Agent> {
        &self.current
    }

    /// The planner, once a planning turn has created it
    pub const fn planner_agent(&self) -> Option<&Arc<Agent>> {
        self.planner.as_ref()
    }

    /// Full transcript, including tool and corrective messages
    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub const fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Whether the current agent produces reasoning output
    pub fn is_reasoning(&self) -> bool {
        self.current.is_reasoning()
    }

    /// Reset the repeated-call guard
    pub fn clear_history(&mut self) {
        self.dispatcher.clear_history();
    }

    /// Run one user turn to its answer.
    ///
    /// The turn streams when `options.stream_callback` is set. Transport
    /// errors are returned; every other failure is fed back to the model.
    pub async fn submit(&mut self, message: impl Into<String>, options: TurnOptions) -> Result<String> {
        let message = message.into();
        tracing::info!(
            agent = self.current.id(),
            planning = options.create_planning_task,
            "Turn started"
        );

        self.context.reset_viewer().await;
        if options.create_planning_task {
            self.handoff_to_planner(&message)?;
        }
        self.transcript.push(Message::user(message));

        let handlers = options.handlers();
        let mut step = 0;

        while step <= self.config.max_steps {
            step += 1;
            tracing::debug!(step, agent = self.current.id(), "Step");

            let reply = self.request_completion(&handlers).await?;
            self.transcript.push(reply.clone());

            if reply.has_tool_calls() {
                if let Some(answer) = self.dispatch(&reply).await {
                    tracing::info!(step, agent = self.current.id(), "Final answer");
                    return Ok(answer);
                }
                continue;
            }

            if self.current.is_reasoning() && !reply.content.is_empty() {
                tracing::info!(agent = self.current.id(), plan = %reply.content, "Planner output");
            }

            match self.config.mode {
                ResponseMode::AllowText => return Ok(reply.content),
                ResponseMode::RequireToolCalls => {
                    tracing::warn!(agent = self.current.id(), "Reply without tool call");
                    self.transcript.push(Message::system(CORRECTIVE_INSTRUCTION));
                }
            }
        }

        tracing::info!(max_steps = self.config.max_steps, "Max steps reached");
        Ok(MAX_STEPS_ANSWER.to_string())
    }

    fn handoff_to_planner(&mut self, task: &str) -> Result<()> {
        let planner = match &self.planner {
            Some(planner) => Arc::clone(planner),
            None => {
                let mut planner = planner_agent(task)?;
                if self.config.mode == ResponseMode::RequireToolCalls {
                    planner.use_final_answer_tool();
                }
                let planner = Arc::new(planner);
                self.planner = Some(Arc::clone(&planner));
                tracing::info!("Planner agent created");
                planner
            }
        };

        self.current = planner;
        Ok(())
    }

    async fn request_completion(&self, handlers: &StreamHandlers) -> Result<Message> {
        let instruction = format!(
            "{}\n{}",
            self.current.instruction(&self.context),
            base_instruction(self.config.mode)
        );

        let mut messages = self.transcript.messages().to_vec();
        messages.push(Message::system(instruction));

        let request = CompletionRequest {
            messages,
            tools: function_descriptors(self.current.tools()),
            options: self.config.options.clone(),
        };
        tracing::debug!(
            agent = self.current.id(),
            tokens = self.transcript.estimate_tokens(),
            tools = ?request.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "Requesting completion"
        );

        let reply = if handlers.on_content.is_some() {
            match self.provider.complete_stream(&request).await {
                Ok(stream) => assemble(stream, handlers, self.current.is_reasoning()).await,
                Err(err) => {
                    handlers.error(&err);
                    Err(err)
                }
            }
        } else {
            self.provider.complete(&request).await
        };

        reply.inspect_err(|err| tracing::error!(error = %err, "Completion failed"))
    }

    /// Dispatch the reply's tool calls; returns the answer when a
    /// final-answer call in the batch completed
    async fn dispatch(&mut self, reply: &Message) -> Option<String> {
        let outcome = self
            .dispatcher
            .execute_tool_calls(reply.tool_calls(), Arc::clone(&self.current), &self.context)
            .await;

        self.transcript.extend(outcome.messages);
        self.current = outcome.agent;
        outcome.answer
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("current", &self.current.id())
            .field("messages", &self.transcript.len())
            .finish_non_exhaustive()
    }
}
