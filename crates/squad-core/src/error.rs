//! Error Types

use thiserror::Error;

/// Result type alias for squad operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Completion service returned an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Completion service unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Streaming response reported an error or broke mid-stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Tool not found on the current agent
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments failed validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool call arguments were not a JSON object
    #[error("Argument parse error: {0}")]
    ArgumentParse(String),

    /// Agent id unknown to the conversation
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Errors raised while talking to the completion service. These abort the
    /// current turn; everything else is contained inside the dispatch pipeline.
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::ProviderUnavailable(_)
                | Self::Stream(_)
                | Self::RateLimited(_)
                | Self::Auth(_)
                | Self::Io(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            Self::Stream(_) => "The response stream was interrupted. Please try again.".into(),
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::AgentNotFound(id) => format!("The agent '{id}' is not part of this conversation."),
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
