//! # squad-runtime
//!
//! Completion transports for squad.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use squad_runtime::HttpTransport;
//!
//! let provider = Arc::new(HttpTransport::from_env()?);
//! let mut squad = Squad::new(agents, provider, SquadConfig::from_env())?;
//! let answer = squad.send("load video 999", TurnOptions::new()).await?;
//! ```

pub mod http;

pub use http::{HttpTransport, HttpTransportConfig};

// Re-export core types for convenience
pub use squad_core::{AgentError, LlmProvider, Message, Result, Role, Squad, SquadConfig, TurnOptions};
