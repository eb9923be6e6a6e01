//! Conversation Context
//!
//! The single piece of state shared by every agent in a conversation. It is
//! owned by the orchestrator and handed by reference into every instruction
//! and tool invocation.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::agent::Agent;

/// Conversation-scoped shared state
pub struct Context {
    /// Agents reachable by transfer, in registration order
    agents: Vec<Arc<Agent>>,

    /// Scratch state reset at the start of every user message
    viewer: RwLock<Map<String, Value>>,

    /// Conversation-level data written by tools (e.g. a loaded video)
    state: RwLock<Map<String, Value>>,

    /// Whether the conversation runs in streaming / free-text mode
    streaming: bool,
}

impl Context {
    pub fn new(agents: Vec<Arc<Agent>>, streaming: bool) -> Self {
        Self {
            agents,
            viewer: RwLock::new(Map::new()),
            state: RwLock::new(Map::new()),
            streaming,
        }
    }

    /// Look up an agent by id
    pub fn agent(&self, id: &str) -> Option<Arc<Agent>> {
        self.agents.iter().find(|a| a.id() == id).cloned()
    }

    /// All registered agents
    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn agent_ids(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.id()).collect()
    }

    pub const fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Read a value from the conversation state
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.state.read().await.get(key).cloned()
    }

    /// Write a value into the conversation state, returning the previous one
    pub async fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.write().await.insert(key.into(), value)
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.state.write().await.remove(key)
    }

    pub async fn viewer_get(&self, key: &str) -> Option<Value> {
        self.viewer.read().await.get(key).cloned()
    }

    pub async fn viewer_set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.viewer.write().await.insert(key.into(), value)
    }

    /// Clear the per-turn viewer scratch state
    pub async fn reset_viewer(&self) {
        self.viewer.write().await.clear();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("agents", &self.agent_ids())
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent(id: &str) -> Arc<Agent> {
        Arc::new(Agent::builder().id(id).task("test").build().unwrap())
    }

    #[test]
    fn test_agent_lookup() {
        let ctx = Context::new(vec![agent("a"), agent("b")], false);
        assert_eq!(ctx.agent_ids(), vec!["a", "b"]);
        assert!(ctx.agent("b").is_some());
        assert!(ctx.agent("c").is_none());
    }

    #[tokio::test]
    async fn test_state_and_viewer() {
        let ctx = Context::new(Vec::new(), true);
        assert!(ctx.is_streaming());

        ctx.set("video", json!({"id": "999"})).await;
        ctx.viewer_set("selection", json!(3)).await;
        assert_eq!(ctx.get("video").await, Some(json!({"id": "999"})));

        ctx.reset_viewer().await;
        assert_eq!(ctx.viewer_get("selection").await, None);
        assert!(ctx.get("video").await.is_some());
    }
}
