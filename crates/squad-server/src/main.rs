//! squad HTTP Server
//!
//! Axum-based server exposing squad conversations over a REST endpoint and
//! a WebSocket streaming endpoint. Conversations are kept in memory and
//! addressed by `conversation_id`.

mod agents;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use squad_core::SquadConfig;
use squad_runtime::HttpTransport;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{chat_handler, chat_stream_handler, health_check};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let transport = HttpTransport::from_env()?;
    if transport.config().api_token.is_none() {
        tracing::warn!("⚠ SQUAD_API_TOKEN not set - the completion service may reject requests");
    }
    tracing::info!("✓ Completion service: {}", transport.config().api_url);

    let config = SquadConfig::from_env();
    tracing::info!(
        max_steps = config.max_steps,
        mode = ?config.mode(),
        model = %config.generation.model,
        "Squad configuration"
    );

    let state = AppState::new(Arc::new(transport), config);
    let app = app(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 squad server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  POST /api/chat        - Send message");
    tracing::info!("  GET  /api/chat/stream - WebSocket streaming");

    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", get(chat_stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
