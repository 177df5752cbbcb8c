/// HTTP API server.
///
/// Thin REST surface over the shared `ChatEngine`: chat, health, feedback
/// capture, and direct memory access. Every handler resolves a missing
/// `user_id` to `"default"` so anonymous clients share one record.
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

use crate::engine::ChatEngine;
use crate::engine::feedback::Quality;
use crate::engine::intent::Intent;

/// Max chat message size: 64 KB. Plenty for conversation, small enough to
/// shrug off junk payloads.
const MAX_MESSAGE_SIZE: usize = 65_536;

const DEFAULT_USER: &str = "default";

/// Request body for POST /api/chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omitted means the shared anonymous user.
    pub user_id: Option<String>,
}

/// Request body for POST /api/feedback.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: Option<String>,
    pub user_input: String,
    pub response: String,
    /// One of `good`, `bad`, `neutral`.
    pub quality: String,
    pub intent: Option<String>,
}

/// Request body for POST /api/remember.
#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub user_id: Option<String>,
    pub key: String,
    pub value: String,
}

/// Query string for GET /api/recall.
#[derive(Debug, Deserialize)]
pub struct RecallQuery {
    pub key: String,
    pub user_id: Option<String>,
}

/// Build the HTTP API router around a shared engine.
pub fn build_router(engine: Arc<ChatEngine>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .route("/api/feedback", post(feedback_handler))
        .route("/api/remember", post(remember_handler))
        .route("/api/recall", get(recall_handler))
        .with_state(engine)
}

/// POST /api/chat — run one message through the pipeline.
async fn chat_handler(
    State(engine): State<Arc<ChatEngine>>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    if body.message.len() > MAX_MESSAGE_SIZE {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(serde_json::json!({"error": "message too large"})),
        );
    }
    let user_id = body.user_id.unwrap_or_else(|| DEFAULT_USER.to_string());
    debug!(
        "chat request: user={}, content_len={}",
        user_id,
        body.message.len()
    );

    let reply = engine.process_message(&user_id, &body.message).await;
    let bot_name = engine.bot_name_for(&user_id).await;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "response": reply.text,
            "bot_name": bot_name,
            "intent": reply.intent,
            "confidence": reply.confidence,
        })),
    )
}

/// GET /api/health — liveness plus a few engine facts.
async fn health_handler(State(engine): State<Arc<ChatEngine>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "classifier_ready": engine.classifier_ready(),
        "users": engine.memory().user_count(),
    }))
}

/// POST /api/feedback — record a rated exchange.
async fn feedback_handler(
    State(engine): State<Arc<ChatEngine>>,
    Json(body): Json<FeedbackRequest>,
) -> impl IntoResponse {
    let Some(quality) = Quality::parse(&body.quality) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "quality must be good, bad, or neutral"})),
        );
    };
    let user_id = body.user_id.unwrap_or_else(|| DEFAULT_USER.to_string());
    let intent = body.intent.as_deref().map(Intent::from_label);

    match engine
        .record_feedback(&user_id, &body.user_input, &body.response, quality, intent)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "recorded"})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

/// POST /api/remember — store one key/value for a user.
async fn remember_handler(
    State(engine): State<Arc<ChatEngine>>,
    Json(body): Json<RememberRequest>,
) -> impl IntoResponse {
    if body.key.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "key must not be empty"})),
        );
    }
    let user_id = body.user_id.unwrap_or_else(|| DEFAULT_USER.to_string());
    engine.memory().set(&user_id, &body.key, body.value).await;
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// GET /api/recall?key=...&user_id=... — read one key back.
async fn recall_handler(
    State(engine): State<Arc<ChatEngine>>,
    Query(query): Query<RecallQuery>,
) -> impl IntoResponse {
    let user_id = query.user_id.unwrap_or_else(|| DEFAULT_USER.to_string());
    match engine.memory().get(&user_id, &query.key).await {
        Some(value) => (
            StatusCode::OK,
            Json(serde_json::json!({"key": query.key, "value": value})),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("no value stored for key '{}'", query.key)})),
        ),
    }
}

/// Bind and serve until the task is aborted or the process exits.
pub async fn serve(engine: Arc<ChatEngine>, host: &str, port: u16) -> Result<()> {
    let app = build_router(engine);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
