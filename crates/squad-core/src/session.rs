//! Session Management
//!
//! A session is one conversation with its own squad. Sessions live in memory
//! only; each is behind an async mutex so a conversation processes one user
//! message at a time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::Result;
use crate::orchestrator::TurnOptions;
use crate::squad::Squad;

/// Unique session identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied id
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One conversation
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    squad: Squad,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,

    turns: usize,
}

impl Session {
    pub fn new(squad: Squad) -> Self {
        Self::with_id(SessionId::new(), squad)
    }

    pub fn with_id(id: SessionId, squad: Squad) -> Self {
        let now = Utc::now();
        Self {
            id,
            squad,
            created_at: now,
            updated_at: now,
            turns: 0,
        }
    }

    /// Run one user message through the squad
    pub async fn send(&mut self, message: impl Into<String>, options: TurnOptions) -> Result<String> {
        self.turns += 1;
        self.touch();
        self.squad.send(message, options).await
    }

    pub const fn squad(&self) -> &Squad {
        &self.squad
    }

    /// Number of user messages sent
    pub const fn turns(&self) -> usize {
        self.turns
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Shared handle to a session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Where sessions are kept
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session and return its handle
    async fn insert(&self, session: Session) -> SessionHandle;

    async fn get(&self, id: &SessionId) -> Option<SessionHandle>;

    /// Remove a session; returns whether it existed
    async fn remove(&self, id: &SessionId) -> bool;

    async fn len(&self) -> usize;
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        tracing::debug!(session = %id, "Session created");
        handle
    }

    async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
