//! Chat assistant and direct tool invocation

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::agent::{
    dispatch, run_conversation, suggest_follow_ups, tool_specs, AgentError, ChatGuard,
    ChatMessage,
};
use crate::api::envelope::{
    agent_error_response, engine_error_response, json_rejection, query_rejection,
    ApiErrorResponse, ApiResponse,
};
use crate::store::{ChatEntry, ChatRole, RecordQuery};

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Prior turns supplied by the client; when absent the stored session
    /// history is used
    #[serde(default)]
    pub history: Option<Vec<HistoryTurn>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    /// Suggested follow-up questions
    pub recommendations: Vec<String>,
    pub tools_used: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub session_id: String,
    pub count: usize,
    pub history: Vec<ChatEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Client identity for rate limiting: first forwarded hop, then the
/// socket peer, then `"unknown"`.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn new_session_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}

fn to_message(role: ChatRole, content: &str) -> ChatMessage {
    match role {
        ChatRole::User => ChatMessage::user(content),
        ChatRole::Assistant => ChatMessage::assistant(content),
    }
}

/// Prior turns: client-supplied when present, otherwise the stored session.
async fn load_history(state: &AppState, req: &ChatRequest, session_id: &str) -> Vec<ChatMessage> {
    if let Some(turns) = &req.history {
        return turns
            .iter()
            .filter_map(|t| ChatRole::parse(&t.role).map(|r| to_message(r, &t.content)))
            .collect();
    }
    if req.session_id.is_none() {
        return Vec::new();
    }

    let window = u32::try_from(state.config.chat.history_window).unwrap_or(u32::MAX);
    match state.store.chat_history(session_id, window).await {
        Ok(entries) => entries
            .iter()
            .map(|e| to_message(e.role, &e.content))
            .collect(),
        Err(e) => {
            warn!(session_id, error = %e, "Chat history unavailable; continuing without it");
            Vec::new()
        }
    }
}

async fn persist_turns(state: &AppState, session_id: &str, question: &str, answer: &ChatResponse) {
    let entries = [
        ChatEntry {
            session_id: session_id.to_string(),
            role: ChatRole::User,
            content: question.to_string(),
            tools_used: Vec::new(),
            timestamp: Utc::now(),
        },
        ChatEntry {
            session_id: session_id.to_string(),
            role: ChatRole::Assistant,
            content: answer.message.clone(),
            tools_used: answer.tools_used.clone(),
            timestamp: answer.timestamp,
        },
    ];
    for entry in &entries {
        if let Err(e) = state.store.append_chat(entry).await {
            warn!(session_id, error = %e, "Failed to persist chat turn");
            return;
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/ai/chat
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(r) => return json_rejection(r),
    };
    let Some(backend) = state.chat.clone() else {
        return agent_error_response(AgentError::NotConfigured);
    };

    let client = client_id(&headers, peer.map(|ConnectInfo(addr)| addr));
    if let Err(e) = state.guard.check_rate_limit(&client) {
        return agent_error_response(e);
    }
    let message = match state.guard.validate_message(&req.message) {
        Ok(m) => m.to_string(),
        Err(e) => return agent_error_response(e),
    };
    if let Err(e) = state.guard.check_budget(&client) {
        return agent_error_response(e);
    }

    let session_id = req
        .session_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(new_session_id);
    let history = load_history(&state, &req, &session_id).await;
    debug!(client = %client, session_id = %session_id, history = history.len(), "Chat request");

    let reply = match run_conversation(backend.as_ref(), state.tool_context(), &history, &message)
        .await
    {
        Ok(r) => r,
        Err(e) => return agent_error_response(e),
    };
    let recommendations = suggest_follow_ups(backend.as_ref(), &message, &reply.message).await;

    let tokens = ChatGuard::estimate_tokens(&message) + ChatGuard::estimate_tokens(&reply.message);
    let spent = state.guard.record_usage(&client, tokens);
    info!(
        client = %client,
        session_id = %session_id,
        tokens,
        spent_today_usd = spent,
        tools = ?reply.tools_used,
        "Chat reply sent"
    );

    let response = ChatResponse {
        message: reply.message,
        session_id: session_id.clone(),
        timestamp: Utc::now(),
        recommendations,
        tools_used: reply.tools_used,
    };
    persist_turns(&state, &session_id, &message, &response).await;

    ApiResponse::ok(response)
}

/// GET /api/ai/chat/history/:session_id?limit=
pub async fn chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(r),
    };
    let limit = match RecordQuery::new(query.limit, None) {
        Ok(q) => q.limit,
        Err(e) => return engine_error_response(e),
    };

    let history = match state.store.chat_history(&session_id, limit).await {
        Ok(h) => h,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Chat history listing failed; returning empty list");
            Vec::new()
        }
    };

    ApiResponse::ok(ChatHistoryResponse {
        session_id,
        count: history.len(),
        history,
    })
}

/// GET /api/ai/chat/stats
pub async fn chat_stats(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.guard.stats())
}

/// GET /api/ai/tools
pub async fn list_tools() -> Response {
    ApiResponse::ok(tool_specs())
}

/// POST /api/ai/tools/:name
///
/// Runs one tool without the model in the loop. The body is the argument
/// object; an empty body means no arguments.
pub async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Response {
    if !tool_specs().iter().any(|t| t.name == name) {
        return agent_error_response(AgentError::UnknownTool(name));
    }

    let client = client_id(&headers, peer.map(|ConnectInfo(addr)| addr));
    if let Err(e) = state.guard.check_rate_limit(&client) {
        return agent_error_response(e);
    }

    let args: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => return ApiErrorResponse::bad_request(format!("Invalid JSON body: {e}")),
        }
    };

    ApiResponse::ok(dispatch(state.tool_context(), &name, &args).await)
}
