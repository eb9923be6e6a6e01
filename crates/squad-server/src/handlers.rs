//! HTTP/WebSocket Handlers

use axum::{
    Json,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use serde_json::json;
use squad_core::{AgentError, SessionStore, TurnOptions};
use tokio::sync::mpsc;

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub conversations: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub create_planning_task: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: &AgentError) -> ApiError {
    let (status, code) = match err {
        AgentError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        e if e.is_transport() => (StatusCode::BAD_GATEWAY, "COMPLETION_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        conversations: state.sessions.len().await,
    })
}

/// Send one message and wait for the answer
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let handle = state
        .session(payload.conversation_id.as_deref())
        .await
        .map_err(|e| api_error(&e))?;

    let mut session = handle.lock().await;
    let options = TurnOptions::new().planning(payload.create_planning_task);

    let message = session.send(payload.message, options).await.map_err(|e| {
        tracing::error!(conversation = %session.id, error = %e, "Turn failed");
        api_error(&e)
    })?;

    Ok(Json(ChatResponse {
        message,
        conversation_id: session.id.to_string(),
    }))
}

/// WebSocket streaming chat
pub async fn chat_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

type WsSender = SplitSink<WebSocket, Message>;

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        let request: ChatRequest = match serde_json::from_str(&msg) {
            Ok(r) => r,
            Err(e) => {
                let error = json!({"type": "error", "error": e.to_string()});
                if send_frame(&mut sender, error.to_string()).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if run_streamed_turn(&mut sender, &state, request).await.is_err() {
            break;
        }
    }
}

/// Stream one turn to the socket. `Err` means the socket is gone.
async fn run_streamed_turn(sender: &mut WsSender, state: &AppState, request: ChatRequest) -> Result<(), axum::Error> {
    let handle = match state.session(request.conversation_id.as_deref()).await {
        Ok(handle) => handle,
        Err(e) => {
            let error = json!({"type": "error", "error": e.user_message()});
            return send_frame(sender, error.to_string()).await;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let options = TurnOptions::new()
        .planning(request.create_planning_task)
        .on_content(move |delta, reasoning| {
            let frame = json!({"type": "content", "content": delta, "reasoning": reasoning});
            let _ = tx.send(frame.to_string());
        });

    let turn = async {
        let mut session = handle.lock().await;
        let result = session.send(request.message, options).await;
        (session.id, result)
    };
    tokio::pin!(turn);

    let (id, result) = loop {
        tokio::select! {
            biased;
            Some(frame) = rx.recv() => send_frame(sender, frame).await?,
            done = &mut turn => break done,
        }
    };

    while let Ok(frame) = rx.try_recv() {
        send_frame(sender, frame).await?;
    }

    let frame = match result {
        Ok(message) => json!({"type": "done", "message": message, "conversation_id": id.to_string()}),
        Err(e) => {
            tracing::error!(conversation = %id, error = %e, "Streamed turn failed");
            json!({"type": "error", "error": e.user_message()})
        }
    };
    send_frame(sender, frame.to_string()).await
}

async fn send_frame(sender: &mut WsSender, frame: String) -> Result<(), axum::Error> {
    sender.send(Message::Text(frame.into())).await
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use serde_json::Value;
    use squad_core::{
        LlmProvider, Message as ChatMessage, SquadConfig, ToolCallRequest,
        error::Result,
        provider::{CompletionRequest, CompletionStream},
        tool::FINAL_ANSWER_TOOL,
    };
    use tower::ServiceExt;

    use super::*;

    /// Answers every request with the next scripted final answer
    struct AnsweringProvider {
        answers: Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl LlmProvider for AnsweringProvider {
        async fn complete(&self, _request: &CompletionRequest) -> Result<ChatMessage> {
            let answer = self
                .answers
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::ProviderUnavailable("script exhausted".into()))?;
            let args = json!({ "answer": answer }).to_string();
            Ok(ChatMessage::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new("call_1", FINAL_ANSWER_TOOL, args)],
            ))
        }

        async fn complete_stream(&self, _request: &CompletionRequest) -> Result<CompletionStream> {
            Err(AgentError::ProviderUnavailable("not scripted".into()))
        }
    }

    fn state(answers: &[&'static str]) -> AppState {
        let provider = AnsweringProvider {
            answers: Mutex::new(answers.iter().copied().collect()),
        };
        AppState::new(Arc::new(provider), SquadConfig::default())
    }

    async fn post_chat(state: AppState, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = crate::app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = crate::app(state(&[]))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_continues_conversation() {
        let state = state(&["Hello!", "Again"]);

        let (status, first) = post_chat(state.clone(), json!({"message": "hi"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["message"], json!("Hello!"));

        let id = first["conversation_id"].as_str().unwrap().to_string();
        let (_, second) = post_chat(state.clone(), json!({"message": "hi again", "conversation_id": id})).await;
        assert_eq!(second["conversation_id"], json!(id));
        assert_eq!(state.sessions.len().await, 1);

        let handle = state.session(Some(&id)).await.unwrap();
        assert_eq!(handle.lock().await.turns(), 2);
    }

    #[tokio::test]
    async fn test_chat_transport_failure() {
        let (status, body) = post_chat(state(&[]), json!({"message": "hi"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], json!("COMPLETION_ERROR"));
    }
}
