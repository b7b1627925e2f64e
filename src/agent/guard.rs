//! Chat abuse protection
//!
//! Per-client sliding-window rate limits, message validation and a rough
//! daily spend ceiling. State is in-process and resets on restart.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::AgentError;
use crate::config::ChatConfig;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Script, SQL and template injection markers.
const INJECTION_PATTERN: &str = r"(?i)<script|javascript:|drop\s+table|delete\s+from|\{\{";

#[derive(Debug, Clone, Copy)]
struct DailySpend {
    day: NaiveDate,
    usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardStats {
    pub active_clients: usize,
    /// Requests admitted within the last hour
    pub total_requests: usize,
    pub total_cost_usd: f64,
    pub status: &'static str,
}

pub struct ChatGuard {
    limits: ChatConfig,
    requests: DashMap<String, VecDeque<Instant>>,
    spend: DashMap<String, DailySpend>,
    injection: Regex,
}

impl ChatGuard {
    pub fn new(limits: ChatConfig) -> Result<Self, AgentError> {
        Ok(Self {
            limits,
            requests: DashMap::new(),
            spend: DashMap::new(),
            injection: Regex::new(INJECTION_PATTERN)?,
        })
    }

    /// Admit one request for `client` or reject it.
    pub fn check_rate_limit(&self, client: &str) -> Result<(), AgentError> {
        self.check_rate_limit_at(client, Instant::now())
    }

    fn check_rate_limit_at(&self, client: &str, now: Instant) -> Result<(), AgentError> {
        let mut history = self.requests.entry(client.to_string()).or_default();
        while history
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= HOUR)
        {
            history.pop_front();
        }

        let per_minute = self.limits.max_requests_per_minute as usize;
        let per_hour = self.limits.max_requests_per_hour as usize;
        let last_minute = history
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < MINUTE)
            .count();

        if last_minute >= per_minute {
            warn!(client, limit = per_minute, "Chat rate limit hit (minute)");
            return Err(AgentError::RateLimited(format!(
                "Rate limit: max {per_minute} requests per minute"
            )));
        }
        if history.len() >= per_hour {
            warn!(client, limit = per_hour, "Chat rate limit hit (hour)");
            return Err(AgentError::RateLimited(format!(
                "Rate limit: max {per_hour} requests per hour"
            )));
        }
        history.push_back(now);
        Ok(())
    }

    /// Validate and trim a user message.
    pub fn validate_message<'m>(&self, message: &'m str) -> Result<&'m str, AgentError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(AgentError::InvalidMessage("Message cannot be empty".to_string()));
        }
        let max = self.limits.max_message_length;
        if trimmed.chars().count() > max {
            return Err(AgentError::InvalidMessage(format!(
                "Message too long (max {max} characters)"
            )));
        }
        if self.injection.is_match(message) {
            return Err(AgentError::InvalidMessage("Invalid message format".to_string()));
        }
        Ok(trimmed)
    }

    /// Rough token count: four characters per token.
    pub fn estimate_tokens(text: &str) -> u64 {
        (text.chars().count() / 4) as u64
    }

    /// Reject a client that already spent its daily budget.
    pub fn check_budget(&self, client: &str) -> Result<(), AgentError> {
        if self.spent_today(client) >= self.limits.max_daily_cost_usd {
            return Err(AgentError::BudgetExceeded);
        }
        Ok(())
    }

    /// Add the estimated cost of `tokens` and return today's total.
    pub fn record_usage(&self, client: &str, tokens: u64) -> f64 {
        let today = Utc::now().date_naive();
        let cost = tokens as f64 / 1000.0 * self.limits.cost_per_1k_tokens_usd;
        let mut entry = self.spend.entry(client.to_string()).or_insert(DailySpend {
            day: today,
            usd: 0.0,
        });
        if entry.day != today {
            *entry = DailySpend { day: today, usd: 0.0 };
        }
        entry.usd += cost;
        entry.usd
    }

    fn spent_today(&self, client: &str) -> f64 {
        let today = Utc::now().date_naive();
        self.spend
            .get(client)
            .filter(|s| s.day == today)
            .map_or(0.0, |s| s.usd)
    }

    pub fn stats(&self) -> GuardStats {
        let today = Utc::now().date_naive();
        let total_cost: f64 = self
            .spend
            .iter()
            .filter(|s| s.day == today)
            .map(|s| s.usd)
            .sum();
        GuardStats {
            active_clients: self.requests.iter().filter(|h| !h.is_empty()).count(),
            total_requests: self.requests.iter().map(|h| h.len()).sum(),
            total_cost_usd: (total_cost * 10_000.0).round() / 10_000.0,
            status: "healthy",
        }
    }

    /// Drop clients idle for over an hour and stale spend entries.
    pub fn prune(&self) {
        let now = Instant::now();
        let today = Utc::now().date_naive();
        self.requests.retain(|_, h| {
            h.back()
                .is_some_and(|t| now.saturating_duration_since(*t) < HOUR)
        });
        self.spend.retain(|_, s| s.day == today);
    }
}

/// Spawn a task that prunes guard state every ten minutes.
pub fn spawn_guard_cleanup(guard: std::sync::Arc<ChatGuard>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            guard.prune();
            info!(clients = guard.requests.len(), "Chat guard pruned");
        }
    });
}
