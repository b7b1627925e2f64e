//! Process types, lookback windows and time-windowed sensor aggregates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::defaults::{DEFAULT_LOOKBACK_HOURS, MAX_WINDOW_HOURS};
use crate::kpi_engine::EngineError;

/// Plant process areas that produce time-windowed aggregates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Kiln,
    Grinding,
    RawMaterial,
    Quality,
    Utilities,
}

impl ProcessType {
    /// Iteration order used by the opportunity aggregator.
    pub const ALL: [ProcessType; 5] = [
        ProcessType::Kiln,
        ProcessType::Grinding,
        ProcessType::RawMaterial,
        ProcessType::Quality,
        ProcessType::Utilities,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessType::Kiln => "kiln",
            ProcessType::Grinding => "grinding",
            ProcessType::RawMaterial => "raw_material",
            ProcessType::Quality => "quality",
            ProcessType::Utilities => "utilities",
        }
    }

    /// Human-readable process name used in reports.
    pub fn display_name(self) -> &'static str {
        match self {
            ProcessType::Kiln => "Kiln Operations",
            ProcessType::Grinding => "Grinding Operations",
            ProcessType::RawMaterial => "Raw Material Feed",
            ProcessType::Quality => "Quality Control",
            ProcessType::Utilities => "Utilities",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "kiln" => Ok(ProcessType::Kiln),
            "grinding" => Ok(ProcessType::Grinding),
            "raw_material" | "raw_materials" => Ok(ProcessType::RawMaterial),
            "quality" => Ok(ProcessType::Quality),
            "utilities" => Ok(ProcessType::Utilities),
            other => Err(EngineError::InvalidInput(format!(
                "unknown process type '{other}' (expected kiln, grinding, raw_material, quality or utilities)"
            ))),
        }
    }
}

/// A validated lookback window in whole hours.
///
/// Always `1..=max_hours`. Construct with [`Window::hours`] or
/// [`Window::hours_clamped`]; oversized requests are clamped rather than
/// rejected so a careless client cannot trigger a full-table scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Window(u32);

impl Window {
    /// Build a window using the default upper bound of one year.
    pub fn hours(hours: i64) -> Result<Self, EngineError> {
        Self::hours_clamped(hours, MAX_WINDOW_HOURS)
    }

    /// Build a window, clamping to `max_hours`.
    pub fn hours_clamped(hours: i64, max_hours: u32) -> Result<Self, EngineError> {
        if hours <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "window must be a positive number of hours, got {hours}"
            )));
        }
        let max = i64::from(max_hours.max(1));
        if hours > max {
            tracing::warn!(requested = hours, max_hours = max, "Window clamped to maximum");
        }
        // Bounded by max_hours (a u32) so the conversion cannot fail.
        let clamped = u32::try_from(hours.min(max)).unwrap_or(max_hours.max(1));
        Ok(Self(clamped))
    }

    /// Convenience for day-based lookbacks (`days × 24`).
    pub fn days(days: i64, max_hours: u32) -> Result<Self, EngineError> {
        if days <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "window must be a positive number of days, got {days}"
            )));
        }
        Self::hours_clamped(days.saturating_mul(24), max_hours)
    }

    pub fn as_hours(self) -> u32 {
        self.0
    }

    /// Hours as the `i32` bound into `make_interval(hours => $1)`.
    pub fn as_sql_hours(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl Default for Window {
    /// The standard 24-hour lookback.
    fn default() -> Self {
        Self(DEFAULT_LOOKBACK_HOURS)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

/// Averaged raw sensor values for one process over one window.
///
/// Every numeric field is optional: `None` means the data store had no value
/// for it in the window, which is different from a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessAggregate {
    pub process_type: ProcessType,
    pub window_hours: u32,
    /// Rows that fell inside the window
    pub row_count: u64,

    pub avg_temperature: Option<f64>,
    pub avg_feed_rate: Option<f64>,
    /// Fossil fuel feed (t/h)
    pub avg_fuel_rate: Option<f64>,
    /// Alternative fuel feed (t/h)
    pub avg_alt_fuel_rate: Option<f64>,
    /// Clinker / product output (t/h)
    pub avg_production: Option<f64>,
    /// Power draw (kW)
    pub avg_power: Option<f64>,
    /// Blaine fineness (cm²/g)
    pub avg_fineness: Option<f64>,
    /// 28-day compressive strength (MPa)
    pub avg_strength_28d: Option<f64>,
    pub avg_o2_pct: Option<f64>,
    pub avg_so3_pct: Option<f64>,

    // Raw-mix oxide chemistry (%)
    pub avg_cao: Option<f64>,
    pub avg_sio2: Option<f64>,
    pub avg_al2o3: Option<f64>,
    pub avg_fe2o3: Option<f64>,

    pub defect_count: Option<u64>,
    pub total_samples: Option<u64>,
}

impl ProcessAggregate {
    /// An aggregate for a window that produced no rows.
    pub fn empty(process_type: ProcessType, window: Window) -> Self {
        Self {
            process_type,
            window_hours: window.as_hours(),
            row_count: 0,
            avg_temperature: None,
            avg_feed_rate: None,
            avg_fuel_rate: None,
            avg_alt_fuel_rate: None,
            avg_production: None,
            avg_power: None,
            avg_fineness: None,
            avg_strength_28d: None,
            avg_o2_pct: None,
            avg_so3_pct: None,
            avg_cao: None,
            avg_sio2: None,
            avg_al2o3: None,
            avg_fe2o3: None,
            defect_count: None,
            total_samples: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.row_count > 0
    }

    /// Check `total_samples >= defect_count`.
    ///
    /// A store returning more defects than samples is reporting garbage; the
    /// caller drops both counts rather than computing a rate above 100 %.
    pub fn sample_counts_consistent(&self) -> bool {
        match (self.defect_count, self.total_samples) {
            (Some(defects), Some(total)) => defects <= total,
            (Some(_), None) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rejects_non_positive() {
        assert!(Window::hours(0).is_err());
        assert!(Window::hours(-5).is_err());
        assert!(Window::days(0, 8760).is_err());
    }

    #[test]
    fn window_clamps_to_maximum() {
        let w = Window::hours_clamped(100_000, 8760).unwrap();
        assert_eq!(w.as_hours(), 8760);
        let w = Window::days(400, 8760).unwrap();
        assert_eq!(w.as_hours(), 8760);
    }

    #[test]
    fn window_keeps_valid_values() {
        assert_eq!(Window::hours(24).unwrap().as_hours(), 24);
        assert_eq!(Window::days(7, 8760).unwrap().as_hours(), 168);
        assert_eq!(Window::hours(24).unwrap().as_sql_hours(), 24);
    }

    #[test]
    fn process_type_parses_aliases() {
        assert_eq!("kiln".parse::<ProcessType>().unwrap(), ProcessType::Kiln);
        assert_eq!("raw-material".parse::<ProcessType>().unwrap(), ProcessType::RawMaterial);
        assert_eq!("Quality".parse::<ProcessType>().unwrap(), ProcessType::Quality);
        assert!("furnace".parse::<ProcessType>().is_err());
    }

    #[test]
    fn empty_aggregate_has_no_fields() {
        let agg = ProcessAggregate::empty(ProcessType::Quality, Window::hours(24).unwrap());
        assert!(!agg.has_data());
        assert_eq!(agg.defect_count, None);
        assert_eq!(agg.total_samples, None);
        assert!(agg.sample_counts_consistent());
    }

    #[test]
    fn inconsistent_sample_counts_detected() {
        let mut agg = ProcessAggregate::empty(ProcessType::Quality, Window::hours(24).unwrap());
        agg.defect_count = Some(5);
        agg.total_samples = Some(3);
        assert!(!agg.sample_counts_consistent());
    }
}
