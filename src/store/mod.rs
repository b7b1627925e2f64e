//! Plant data store
//!
//! The engine and HTTP layer read everything through [`PlantStore`], so the
//! same code runs against PostgreSQL ([`PgStore`]) or the in-process
//! [`MemoryStore`] used by tests, demo mode and the no-database fallback.

pub mod db;
mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::defaults::{DEFAULT_RECORD_LIMIT, MAX_RECORD_LIMIT};
use crate::kpi_engine::EngineError;
use crate::types::{LocationFilter, PlantLocation, ProcessAggregate, ProcessType, Window};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Query '{0}' timed out after {1}s")]
    Timeout(&'static str, u64),

    #[error("No data store configured")]
    NotConfigured,
}

// ============================================================================
// Telemetry tables
// ============================================================================

/// Telemetry tables exposed for raw listing.
///
/// SQL table names come only from this enum, never from request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordTable {
    KilnOperations,
    AlternativeFuels,
    OptimizationResults,
    UtilitiesMonitoring,
    RawMaterialFeed,
    GrindingOperations,
    QualityControl,
    AiRecommendations,
}

/// How a table's optional text filter is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    /// Case-insensitive substring match on the column
    Contains(&'static str),
    /// Exact match on the column
    Equals(&'static str),
}

impl RecordTable {
    pub const ALL: [RecordTable; 8] = [
        RecordTable::KilnOperations,
        RecordTable::AlternativeFuels,
        RecordTable::OptimizationResults,
        RecordTable::UtilitiesMonitoring,
        RecordTable::RawMaterialFeed,
        RecordTable::GrindingOperations,
        RecordTable::QualityControl,
        RecordTable::AiRecommendations,
    ];

    /// URL path segment, e.g. `kiln-operations`.
    pub fn slug(self) -> &'static str {
        match self {
            RecordTable::KilnOperations => "kiln-operations",
            RecordTable::AlternativeFuels => "alternative-fuels",
            RecordTable::OptimizationResults => "optimization-results",
            RecordTable::UtilitiesMonitoring => "utilities-monitoring",
            RecordTable::RawMaterialFeed => "raw-material-feed",
            RecordTable::GrindingOperations => "grinding-operations",
            RecordTable::QualityControl => "quality-control",
            RecordTable::AiRecommendations => "ai-recommendations",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            RecordTable::KilnOperations => "kiln_operations",
            RecordTable::AlternativeFuels => "alternative_fuels",
            RecordTable::OptimizationResults => "optimization_results",
            RecordTable::UtilitiesMonitoring => "utilities_monitoring",
            RecordTable::RawMaterialFeed => "raw_material_feed",
            RecordTable::GrindingOperations => "grinding_operations",
            RecordTable::QualityControl => "quality_control",
            RecordTable::AiRecommendations => "ai_recommendations",
        }
    }

    pub fn filter(self) -> Option<RecordFilter> {
        match self {
            RecordTable::OptimizationResults => Some(RecordFilter::Contains("optimization_type")),
            RecordTable::AiRecommendations => Some(RecordFilter::Equals("status")),
            _ => None,
        }
    }

    /// Table backing a process aggregate, if any.
    pub fn for_process(process: ProcessType) -> Self {
        match process {
            ProcessType::Kiln => RecordTable::KilnOperations,
            ProcessType::Grinding => RecordTable::GrindingOperations,
            ProcessType::RawMaterial => RecordTable::RawMaterialFeed,
            ProcessType::Quality => RecordTable::QualityControl,
            ProcessType::Utilities => RecordTable::UtilitiesMonitoring,
        }
    }
}

impl fmt::Display for RecordTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for RecordTable {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        RecordTable::ALL
            .into_iter()
            .find(|t| t.slug() == wanted)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown data table '{s}'")))
    }
}

/// Parameters for a raw listing.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub limit: u32,
    pub filter: Option<String>,
}

impl RecordQuery {
    /// Validate `limit` into `1..=MAX_RECORD_LIMIT` (default 50). Blank
    /// filters are dropped.
    pub fn new(limit: Option<i64>, filter: Option<String>) -> Result<Self, EngineError> {
        let limit = match limit {
            None => DEFAULT_RECORD_LIMIT,
            Some(n) if (1..=i64::from(MAX_RECORD_LIMIT)).contains(&n) => {
                u32::try_from(n).unwrap_or(DEFAULT_RECORD_LIMIT)
            }
            Some(n) => {
                return Err(EngineError::InvalidInput(format!(
                    "limit must be between 1 and {MAX_RECORD_LIMIT}, got {n}"
                )))
            }
        };
        Ok(Self {
            limit,
            filter: filter.filter(|f| !f.trim().is_empty()),
        })
    }
}

// ============================================================================
// Stored records
// ============================================================================

/// A recommendation row from `ai_recommendations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub module: String,
    pub recommendation_type: Option<String>,
    pub description: String,
    pub priority: Option<String>,
    pub estimated_savings: Option<f64>,
    pub confidence_score: Option<f64>,
    pub status: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// One persisted chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    /// Names of tools invoked while producing an assistant turn
    #[serde(default)]
    pub tools_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Store trait
// ============================================================================

/// Read access to plant telemetry plus chat persistence.
#[async_trait]
pub trait PlantStore: Send + Sync {
    /// Short backend name for health output.
    fn backend_name(&self) -> &'static str;

    /// Round-trip check for `/db-check`.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Averaged sensor values for one process over `window`.
    ///
    /// A window with no rows yields [`ProcessAggregate::empty`].
    async fn fetch_aggregate(
        &self,
        process: ProcessType,
        window: Window,
    ) -> Result<ProcessAggregate, StoreError>;

    /// Newest-first raw rows as JSON objects.
    async fn recent_records(
        &self,
        table: RecordTable,
        query: &RecordQuery,
    ) -> Result<Vec<serde_json::Value>, StoreError>;

    /// Plants matching `filter`, ordered by name.
    async fn list_locations(&self, filter: &LocationFilter)
        -> Result<Vec<PlantLocation>, StoreError>;

    async fn get_location(&self, code: &str) -> Result<Option<PlantLocation>, StoreError>;

    /// Newest-first recommendations, optionally for one module.
    async fn recommendations(
        &self,
        module: Option<&str>,
        limit: u32,
    ) -> Result<Vec<StoredRecommendation>, StoreError>;

    async fn append_chat(&self, entry: &ChatEntry) -> Result<(), StoreError>;

    /// The last `limit` turns of a session, oldest first.
    async fn chat_history(&self, session_id: &str, limit: u32)
        -> Result<Vec<ChatEntry>, StoreError>;
}
