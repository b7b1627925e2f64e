//! Chat Flow Tests
//!
//! Drives `POST /api/ai/chat` end to end with a scripted model standing in
//! for the hosted LLM: tool round trip, follow-ups, persistence, guard limits.

use cement_ops::agent::{AgentError, ChatBackend, ChatMessage, ToolCall, ToolSpec};
use cement_ops::api::{create_app, AppState};
use cement_ops::config::PlantConfig;
use cement_ops::store::MemoryStore;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Replays canned replies in order; errors once the script runs out.
struct ScriptedModel {
    replies: Mutex<VecDeque<ChatMessage>>,
    /// Tool catalogue size offered on each call
    offered: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    fn new(replies: Vec<ChatMessage>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            offered: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatBackend for ScriptedModel {
    fn backend_name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatMessage, AgentError> {
        self.offered.lock().unwrap().push(tools.len());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Malformed("script exhausted".to_string()))
    }
}

fn state_with(model: Arc<ScriptedModel>, config: PlantConfig) -> AppState {
    AppState::new(Arc::new(MemoryStore::demo()), Arc::new(config))
        .unwrap()
        .with_chat_backend(model)
}

async fn post_chat(state: AppState, body: Value) -> Response {
    create_app(state)
        .oneshot(
            Request::post("/api/ai/chat")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn tool_round_trip_answer_and_history() {
    let model = ScriptedModel::new(vec![
        ChatMessage::tool_request(vec![ToolCall::new(
            "call_1",
            "calculate_efficiency_metrics",
            json!({ "process_type": "kiln" }),
        )]),
        ChatMessage::assistant("Alternative fuel is at 25%, below the 30% minimum."),
        ChatMessage::assistant(
            "1. How can we raise RDF feed safely?\n2. What is the kiln O2 trend today?",
        ),
    ]);
    let state = state_with(Arc::clone(&model), PlantConfig::default());

    let resp = post_chat(state.clone(), json!({ "message": "How is the kiln doing?" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    let data = &v["data"];
    assert_eq!(data["message"], "Alternative fuel is at 25%, below the 30% minimum.");
    assert_eq!(data["tools_used"], json!(["calculate_efficiency_metrics"]));
    assert_eq!(
        data["recommendations"],
        json!([
            "How can we raise RDF feed safely?",
            "What is the kiln O2 trend today?"
        ])
    );
    let session = data["session_id"].as_str().unwrap().to_string();
    assert!(session.starts_with("session_"));

    // Tools offered on the answer rounds, none for the follow-up request
    assert_eq!(*model.offered.lock().unwrap(), vec![6, 6, 0]);

    // Both turns persisted, oldest first
    let resp = create_app(state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/api/ai/chat/history/{session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let v = body_json(resp).await;
    assert_eq!(v["data"]["count"], 2);
    assert_eq!(v["data"]["history"][0]["role"], "user");
    assert_eq!(v["data"]["history"][0]["content"], "How is the kiln doing?");
    assert_eq!(v["data"]["history"][1]["role"], "assistant");

    // Usage recorded against the forwarded client
    let stats = state.guard.stats();
    assert_eq!(stats.active_clients, 1);
    assert_eq!(stats.total_requests, 1);
}

#[tokio::test]
async fn follow_ups_fall_back_when_model_fails() {
    let model = ScriptedModel::new(vec![ChatMessage::assistant("Grinding is on target.")]);
    let state = state_with(model, PlantConfig::default());

    let resp = post_chat(
        state,
        json!({ "message": "Grinding status?", "session_id": "session_fixed" }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["data"]["session_id"], "session_fixed");
    assert_eq!(v["data"]["recommendations"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn rejected_messages_never_reach_the_model() {
    let model = ScriptedModel::new(Vec::new());
    let state = state_with(Arc::clone(&model), PlantConfig::default());

    for bad in ["   ", "DROP TABLE kiln_operations", &"x".repeat(2001)] {
        let resp = post_chat(state.clone(), json!({ "message": bad })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{bad:.20}");
    }
    let resp = post_chat(state.clone(), json!({ "text": "wrong field" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(model.offered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rate_limit_returns_429() {
    let mut config = PlantConfig::default();
    config.chat.max_requests_per_minute = 2;
    let model = ScriptedModel::new(Vec::new());
    let state = state_with(model, config);

    // Rejected messages still count against the limit
    for _ in 0..2 {
        let resp = post_chat(state.clone(), json!({ "message": "" })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
    let resp = post_chat(state, json!({ "message": "Kiln status?" })).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let v = body_json(resp).await;
    assert_eq!(v["error"]["message"], "Rate limit: max 2 requests per minute");
}

#[tokio::test]
async fn model_failure_is_502() {
    let model = ScriptedModel::new(Vec::new());
    let state = state_with(model, PlantConfig::default());

    let resp = post_chat(state, json!({ "message": "Kiln status?" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn endless_tool_calls_are_cut_off() {
    let mut config = PlantConfig::default();
    config.chat.max_tool_rounds = 1;
    let call = || {
        ChatMessage::tool_request(vec![ToolCall::new(
            "c",
            "find_optimization_opportunities",
            Value::Null,
        )])
    };
    let model = ScriptedModel::new(vec![call(), call()]);
    let state = state_with(Arc::clone(&model), config);

    let resp = post_chat(state, json!({ "message": "Find savings" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    // The final round offers no tools
    assert_eq!(*model.offered.lock().unwrap(), vec![6, 0]);
}
