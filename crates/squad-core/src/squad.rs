//! Squad Facade
//!
//! Wires agents, a completion provider and configuration into one
//! conversation.

use std::sync::Arc;

use crate::agent::Agent;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, OrchestratorConfig, ResponseMode, TurnOptions};
use crate::provider::{GenerationOptions, LlmProvider};

/// Conversation configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SquadConfig {
    /// Step ceiling per user message
    pub max_steps: usize,

    /// Stream responses and allow plain-text answers
    pub enable_stream: bool,

    /// Require tool calls even when streaming
    pub force_tools: bool,

    pub generation: GenerationOptions,
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            enable_stream: false,
            force_tools: false,
            generation: GenerationOptions::default(),
        }
    }
}

impl SquadConfig {
    /// Read `SQUAD_*` variables, keeping defaults for absent or invalid values
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let generation = GenerationOptions {
            llm_name: std::env::var("SQUAD_LLM").unwrap_or(defaults.generation.llm_name),
            model: std::env::var("SQUAD_MODEL").unwrap_or(defaults.generation.model),
            temperature: env_parse("SQUAD_TEMPERATURE").unwrap_or(defaults.generation.temperature),
        };

        Self {
            max_steps: env_parse("SQUAD_MAX_STEPS").unwrap_or(defaults.max_steps),
            enable_stream: env_parse("SQUAD_ENABLE_STREAM").unwrap_or(defaults.enable_stream),
            force_tools: env_parse("SQUAD_FORCE_TOOLS").unwrap_or(defaults.force_tools),
            generation,
        }
    }

    /// Response mode implied by the flags
    pub const fn mode(&self) -> ResponseMode {
        if self.force_tools || !self.enable_stream {
            ResponseMode::RequireToolCalls
        } else {
            ResponseMode::AllowText
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// A team of agents sharing one conversation
#[derive(Debug)]
pub struct Squad {
    config: SquadConfig,
    orchestrator: Orchestrator,
}

impl Squad {
    /// The first agent answers the first message
    pub fn new(agents: Vec<Agent>, provider: Arc<dyn LlmProvider>, config: SquadConfig) -> Result<Self> {
        let orchestrator = Orchestrator::new(
            agents,
            provider,
            OrchestratorConfig {
                max_steps: config.max_steps,
                mode: config.mode(),
                options: config.generation.clone(),
            },
        )?;

        Ok(Self { config, orchestrator })
    }

    /// Send a user message and wait for the answer
    pub async fn send(&mut self, message: impl Into<String>, options: TurnOptions) -> Result<String> {
        self.orchestrator.submit(message, options).await
    }

    pub const fn config(&self) -> &SquadConfig {
        &self.config
    }

    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}
