//! Application State

use std::sync::Arc;

use squad_core::{
    LlmProvider, MemorySessionStore, Result, Session, SessionId, SessionStore, Squad, SquadConfig,
    session::SessionHandle,
};

use crate::agents::build_agents;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Completion service client
    pub provider: Arc<dyn LlmProvider>,

    /// Configuration applied to every new conversation
    pub config: SquadConfig,

    /// Live conversations
    pub sessions: Arc<MemorySessionStore>,
}

impl AppState {
    pub fn new(provider: Arc<dyn LlmProvider>, config: SquadConfig) -> Self {
        Self {
            provider,
            config,
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }

    /// The conversation for `conversation_id`, or a new one. A well-formed
    /// but unknown id is kept as the new conversation's id.
    pub async fn session(&self, conversation_id: Option<&str>) -> Result<SessionHandle> {
        let id = conversation_id.and_then(SessionId::parse);

        let existing = match id {
            Some(id) => self.sessions.get(&id).await,
            None => None,
        };
        if let Some(handle) = existing {
            return Ok(handle);
        }

        let squad = Squad::new(build_agents()?, Arc::clone(&self.provider), self.config.clone())?;
        let session = match id {
            Some(id) => Session::with_id(id, squad),
            None => Session::new(squad),
        };
        tracing::info!(conversation = %session.id, "New conversation");

        Ok(self.sessions.insert(session).await)
    }
}
