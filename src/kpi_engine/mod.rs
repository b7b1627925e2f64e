//! KPI Engine
//!
//! Deterministic calculations over time-windowed process aggregates.
//! Everything here is plain arithmetic and band comparison; the only
//! asynchronous step is the aggregate fetch through [`PlantStore`].
//!
//! - [`formulas`] - derived-metric formulas over optional inputs
//! - [`thresholds`] - target-band evaluation and message templates
//! - [`report`] - per-process metric reports with a stable key set
//! - [`opportunities`] - plant-wide opportunity aggregation
//! - [`kpis`] - headline KPI summary
//! - [`proximity`] - Haversine distance and nearby-plant search
//!
//! [`PlantStore`]: crate::store::PlantStore

pub mod formulas;
pub mod kpis;
pub mod opportunities;
pub mod proximity;
pub mod report;
pub mod thresholds;

pub use formulas::{Computed, NotComputable};
pub use kpis::{kpi_summary, Kpi, KpiSummary};
pub use opportunities::{find_opportunities, rank, OpportunityReport};
pub use proximity::{find_nearby, haversine_km, search_radius, NearbyPlant};
pub use report::{compute_process_metrics, efficiency_report, quality_trends, ProcessMetrics, QualityTrends};
pub use thresholds::{evaluate, Evaluation};

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by engine operations.
///
/// Missing data is not an error; it shows up as unavailable readings.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any data-store call (window, coordinates, radius)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data store unavailable: {0}")]
    Upstream(#[from] StoreError),
}
