//! # squad-core
//!
//! Multi-agent conversation orchestration: a team of agents shares one
//! conversation, hands it to each other through a transfer tool, and calls
//! tools until one of them delivers a final answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Squad                                   │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ Orchestrator │──▶│  Dispatcher  │──▶│ Agent ToolRegistry   │  │
//! │  │  (step loop) │   │ (tool calls) │   │ transfer/final/...   │  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────────────────┘  │
//! │         │                  │                                      │
//! │         ▼                  ▼                                      │
//! │  ┌──────────────┐   ┌──────────────┐                              │
//! │  │ LlmProvider  │   │   Context    │  shared state, agent lookup  │
//! │  │  (Strategy)  │   └──────────────┘                              │
//! │  └──────────────┘                                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the step loop independent of how the
//! completion service is reached; `squad-runtime` supplies the HTTP one.

pub mod agent;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod prebuilt;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod session;
pub mod squad;
pub mod stream;
pub mod tool;

pub use agent::{Agent, AgentBuilder};
pub use context::Context;
pub use error::{AgentError, Result};
pub use message::{Message, Role, ToolCallRequest};
pub use orchestrator::{Orchestrator, OrchestratorConfig, ResponseMode, TurnOptions};
pub use provider::{GenerationOptions, LlmProvider};
pub use session::{MemorySessionStore, Session, SessionId, SessionStore};
pub use squad::{Squad, SquadConfig};
pub use tool::{FnTool, ParameterSchema, Tool, ToolContext, ToolOutput, ToolRegistry, ToolSchema};
