use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use quip::config::Config;
use quip::engine::ChatEngine;
use quip::gateway::build_router;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

fn router_in(dir: &TempDir) -> Router {
    let config = Config::default().with_home(dir.path());
    let engine = Arc::new(ChatEngine::new(config).expect("engine builds"));
    build_router(engine)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok_and_version() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], quip::VERSION);
    assert_eq!(body["classifier_ready"], true);
}

#[tokio::test]
async fn chat_returns_reply_with_metadata() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let response = app
        .oneshot(post_json(
            "/api/chat",
            serde_json::json!({"message": "hello", "user_id": "web:1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["intent"], "greeting");
    assert_eq!(body["bot_name"], "Wicked");
    assert!(body["confidence"].as_f64().unwrap() > 0.5);
    assert!(!body["response"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn chat_without_user_id_uses_shared_default() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/chat",
            serde_json::json!({"message": "my name is Dana"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/recall?key=name")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["value"], "Dana");
}

#[tokio::test]
async fn remember_and_recall_round_trip() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/remember",
            serde_json::json!({"user_id": "u", "key": "favorite_color", "value": "teal"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/recall?key=favorite_color&user_id=u")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["key"], "favorite_color");
    assert_eq!(body["value"], "teal");
}

#[tokio::test]
async fn recall_unknown_key_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/recall?key=nothing&user_id=u")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn remember_rejects_empty_key() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let response = app
        .oneshot(post_json(
            "/api/remember",
            serde_json::json!({"user_id": "u", "key": "  ", "value": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feedback_accepts_known_qualities_only() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/feedback",
            serde_json::json!({
                "user_input": "hello",
                "response": "Hello there!",
                "quality": "good",
                "intent": "greeting"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json(
            "/api/feedback",
            serde_json::json!({
                "user_input": "hello",
                "response": "Hello there!",
                "quality": "amazing"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_message_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    let big = "a".repeat(70_000);
    let response = app
        .oneshot(post_json(
            "/api/chat",
            serde_json::json!({"message": big}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn chat_users_are_isolated() {
    let dir = TempDir::new().unwrap();
    let app = router_in(&dir);

    app.clone()
        .oneshot(post_json(
            "/api/chat",
            serde_json::json!({"message": "my name is Ana", "user_id": "a"}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/recall?key=name&user_id=b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
