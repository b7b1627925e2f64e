//! API route handlers
//!
//! Request handling for every endpoint, grouped by surface:
//! - Liveness and data-store connectivity
//! - Process analytics, opportunities and KPIs
//! - Raw telemetry listing
//! - Plant location catalogue and proximity search
//! - Chat assistant and direct tool invocation

mod analytics;
mod chat;
mod data;
mod health;
mod locations;

pub use analytics::*;
pub use chat::*;
pub use data::*;
pub use health::*;
pub use locations::*;

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::agent::{AgentError, ChatBackend, ChatGuard, HostedChatClient, ToolContext};
use crate::config::PlantConfig;
use crate::store::PlantStore;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Telemetry and catalogue source
    pub store: Arc<dyn PlantStore>,
    /// Loaded, validated configuration (read-only)
    pub config: Arc<PlantConfig>,
    /// Chat rate limits and spend tracking
    pub guard: Arc<ChatGuard>,
    /// Hosted model; `None` when no API key is configured
    pub chat: Option<Arc<dyn ChatBackend>>,
    pub started_at: Instant,
}

impl AppState {
    /// Build state from config, wiring the hosted chat client when a key
    /// is present.
    pub fn new(store: Arc<dyn PlantStore>, config: Arc<PlantConfig>) -> Result<Self, AgentError> {
        let guard = Arc::new(ChatGuard::new(config.chat.clone())?);
        let chat: Option<Arc<dyn ChatBackend>> = if config.llm.is_configured() {
            let client = HostedChatClient::new(&config.llm)?;
            info!(model = %client.model(), "Chat assistant enabled");
            Some(Arc::new(client))
        } else {
            info!("No LLM API key configured; chat endpoints will return 503");
            None
        };

        Ok(Self {
            store,
            config,
            guard,
            chat,
            started_at: Instant::now(),
        })
    }

    /// Replace the chat backend (tests, alternative providers).
    pub fn with_chat_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.chat = Some(backend);
        self
    }

    pub(crate) fn tool_context(&self) -> ToolContext<'_> {
        ToolContext {
            store: self.store.as_ref(),
            config: self.config.as_ref(),
        }
    }
}
