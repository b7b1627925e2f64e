//! Cement Ops: plant operations backend
//!
//! Turns time-windowed process telemetry into efficiency metrics, target-band
//! evaluations and ranked optimisation opportunities, and serves them over
//! HTTP alongside a plant location catalogue and a tool-using chat assistant.
//!
//! ## Architecture
//!
//! - **Store**: PostgreSQL (or in-memory) access behind [`store::PlantStore`]
//! - **KPI Engine**: derived metrics, band evaluation, opportunities, proximity
//! - **Agent**: hosted-LLM conversation loop over a JSON-schema tool catalogue
//! - **API**: axum routes wrapping everything in a uniform JSON envelope

pub mod agent;
pub mod api;
pub mod config;
pub mod kpi_engine;
pub mod store;
pub mod types;

// Re-export configuration
pub use config::PlantConfig;

// Re-export commonly used types
pub use types::{
    Coordinates, MetricKind, MetricReading, MetricStatus, Opportunity, PlantLocation, Priority,
    ProcessAggregate, ProcessType, TargetBand, Window,
};

// Re-export engine entry points
pub use kpi_engine::{
    efficiency_report, find_nearby, find_opportunities, haversine_km, kpi_summary, EngineError,
    OpportunityReport, ProcessMetrics,
};

// Re-export storage
pub use store::{MemoryStore, PgStore, PlantStore, StoreError};

// Re-export HTTP entry points
pub use api::{create_app, AppState};
