//! Plant Assistant Agent
//!
//! Conversational front end over the KPI engine. The hosted model decides
//! which tools to call; this module only describes the tools, runs them
//! against the store, and bounds the round trips.
//!
//! - [`tools`] - JSON-schema tool catalogue and dispatch
//! - [`client`] - OpenAI-compatible chat-completions client
//! - [`conversation`] - bounded tool loop and follow-up suggestions
//! - [`guard`] - per-client rate limits, message validation, cost budget

pub mod client;
pub mod conversation;
pub mod guard;
pub mod tools;

pub use client::{ChatBackend, ChatMessage, HostedChatClient, Role, ToolCall};
pub use conversation::{run_conversation, suggest_follow_ups, ChatReply};
pub use guard::{ChatGuard, GuardStats};
pub use tools::{dispatch, tool_specs, ToolContext, ToolSpec};

use thiserror::Error;

use crate::kpi_engine::EngineError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Malformed LLM response: {0}")]
    Malformed(String),

    #[error("No LLM API key configured")]
    NotConfigured,

    #[error("No final answer after {0} tool rounds")]
    ToolRoundsExhausted(u32),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    InvalidMessage(String),

    #[error("Daily cost limit reached. Please try again tomorrow.")]
    BudgetExceeded,

    #[error("Invalid guard pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
