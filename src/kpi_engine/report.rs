//! Per-process metric reports
//!
//! A report always carries every metric key for its process. Readings that
//! cannot be computed are present with `available: false` and a reason.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{debug, warn};

use super::formulas::{self, Computed, NotComputable};
use super::thresholds::evaluate;
use crate::config::PlantConfig;
use crate::store::PlantStore;
use crate::types::{
    round2, MetricKind, MetricReading, MetricStatus, ProcessAggregate, ProcessType, TargetBand,
    Window,
};

/// Metrics reported for each process, in report order.
pub fn metric_kinds(process: ProcessType) -> &'static [MetricKind] {
    match process {
        ProcessType::Kiln => &[
            MetricKind::ThermalEfficiency,
            MetricKind::AlternativeFuelRate,
            MetricKind::BurningZoneTemperature,
            MetricKind::ClinkerProduction,
            MetricKind::KilnOxygen,
        ],
        ProcessType::Grinding => &[
            MetricKind::SpecificEnergy,
            MetricKind::GrindingEfficiencyScore,
            MetricKind::ProductFineness,
        ],
        ProcessType::RawMaterial => &[
            MetricKind::LimeSaturationFactor,
            MetricKind::SilicaModulus,
            MetricKind::AluminaModulus,
        ],
        ProcessType::Quality => &[
            MetricKind::DefectRate,
            MetricKind::CompressiveStrength28d,
            MetricKind::Fineness,
            MetricKind::So3,
        ],
        ProcessType::Utilities => &[MetricKind::SpecificPower, MetricKind::PowerDraw],
    }
}

/// Derived metrics for one process over one window.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub process: ProcessType,
    pub process_name: &'static str,
    pub window_hours: u32,
    pub row_count: u64,
    pub data_available: bool,
    /// Worst status among available readings
    pub overall_status: Option<MetricStatus>,
    #[serde(serialize_with = "readings_as_map")]
    pub metrics: Vec<MetricReading>,
    pub recommendations: Vec<String>,
    /// Set when the data store call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_error: Option<String>,
}

impl ProcessMetrics {
    pub fn reading(&self, kind: MetricKind) -> Option<&MetricReading> {
        self.metrics.iter().find(|r| r.kind == kind)
    }

    /// Available value for `kind`, if any.
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        self.reading(kind).and_then(|r| r.value)
    }

    /// Report for a process whose aggregate could not be fetched.
    pub fn unavailable(
        process: ProcessType,
        window: Window,
        config: &PlantConfig,
        error: String,
    ) -> Self {
        let metrics = metric_kinds(process)
            .iter()
            .map(|&kind| {
                build_reading(
                    kind,
                    Err(NotComputable::StoreUnavailable),
                    config.targets.band(kind),
                )
            })
            .collect();
        Self {
            process,
            process_name: process.display_name(),
            window_hours: window.as_hours(),
            row_count: 0,
            data_available: false,
            overall_status: None,
            metrics,
            recommendations: vec![format!(
                "{} data unavailable; check the data store connection",
                process.display_name()
            )],
            upstream_error: Some(error),
        }
    }
}

/// Serialize readings as a `{ key: reading }` object in report order.
fn readings_as_map<S: Serializer>(readings: &[MetricReading], s: S) -> Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(readings.len()))?;
    for r in readings {
        map.serialize_entry(r.name, r)?;
    }
    map.end()
}

fn build_reading(kind: MetricKind, computed: Computed, target: TargetBand) -> MetricReading {
    match computed {
        Ok(raw) => {
            // Status comes from the raw value; only the display is rounded
            let eval = evaluate(kind, raw, &target);
            let value = round2(raw);
            MetricReading {
                name: kind.key(),
                kind,
                label: kind.label(),
                unit: kind.unit(),
                value: Some(value),
                available: true,
                reason: None,
                target,
                target_text: target.to_string(),
                status: Some(eval.status),
                message: eval.message,
            }
        }
        Err(reason) => MetricReading {
            name: kind.key(),
            kind,
            label: kind.label(),
            unit: kind.unit(),
            value: None,
            available: false,
            reason: Some(reason.to_string()),
            target,
            target_text: target.to_string(),
            status: None,
            message: format!("{} unavailable: {reason}", kind.label()),
        },
    }
}

/// Compute one metric from an aggregate.
fn compute(kind: MetricKind, agg: &ProcessAggregate, config: &PlantConfig) -> Computed {
    if !agg.has_data() {
        return Err(NotComputable::NoRows);
    }
    let f = &config.formulas;
    match kind {
        MetricKind::ThermalEfficiency => formulas::thermal_efficiency(
            agg.avg_production,
            agg.avg_fuel_rate,
            agg.avg_alt_fuel_rate,
            f.thermal_conversion_factor,
        ),
        MetricKind::AlternativeFuelRate => {
            formulas::alternative_fuel_rate(agg.avg_fuel_rate, agg.avg_alt_fuel_rate)
        }
        MetricKind::BurningZoneTemperature => {
            formulas::measured(agg.avg_temperature, "burning zone temperature")
        }
        MetricKind::ClinkerProduction => formulas::measured(agg.avg_production, "clinker production"),
        MetricKind::KilnOxygen => formulas::measured(agg.avg_o2_pct, "kiln O2"),
        MetricKind::SpecificEnergy => formulas::specific_energy(agg.avg_power, agg.avg_feed_rate),
        MetricKind::GrindingEfficiencyScore => {
            formulas::specific_energy(agg.avg_power, agg.avg_feed_rate).map(|se| {
                formulas::grinding_efficiency_score(
                    se,
                    f.efficiency_score_reference_kwh_t,
                    f.efficiency_score_slope,
                )
            })
        }
        MetricKind::ProductFineness => formulas::measured(agg.avg_fineness, "mill product fineness"),
        MetricKind::LimeSaturationFactor => {
            formulas::lime_saturation_factor(agg.avg_cao, agg.avg_sio2, agg.avg_al2o3, agg.avg_fe2o3)
        }
        MetricKind::SilicaModulus => {
            formulas::silica_modulus(agg.avg_sio2, agg.avg_al2o3, agg.avg_fe2o3)
        }
        MetricKind::AluminaModulus => formulas::alumina_modulus(agg.avg_al2o3, agg.avg_fe2o3),
        MetricKind::DefectRate => formulas::defect_rate(agg.defect_count, agg.total_samples),
        MetricKind::CompressiveStrength28d => {
            formulas::measured(agg.avg_strength_28d, "28-day strength")
        }
        MetricKind::Fineness => formulas::measured(agg.avg_fineness, "Blaine fineness"),
        MetricKind::So3 => formulas::measured(agg.avg_so3_pct, "SO3"),
        MetricKind::SpecificPower => formulas::specific_power(agg.avg_power, agg.avg_production),
        MetricKind::PowerDraw => formulas::measured(agg.avg_power, "power draw"),
    }
}

/// Build the report for an aggregate. Pure; no I/O.
pub fn compute_process_metrics(agg: &ProcessAggregate, config: &PlantConfig) -> ProcessMetrics {
    let process = agg.process_type;
    if !agg.sample_counts_consistent() {
        warn!(
            process = %process,
            defects = ?agg.defect_count,
            samples = ?agg.total_samples,
            "Inconsistent sample counts from data store"
        );
    }
    let metrics: Vec<MetricReading> = metric_kinds(process)
        .iter()
        .map(|&kind| build_reading(kind, compute(kind, agg, config), config.targets.band(kind)))
        .collect();

    let overall_status = metrics.iter().filter_map(|r| r.status).max();

    let mut recommendations: Vec<String> = metrics
        .iter()
        .filter(|r| matches!(r.status, Some(s) if s != MetricStatus::Optimal))
        .map(|r| r.message.clone())
        .collect();
    if !agg.has_data() {
        recommendations.push(format!(
            "No {} data in the last {}h; check the data feed",
            process.display_name(),
            agg.window_hours
        ));
    } else if recommendations.is_empty() && overall_status.is_some() {
        recommendations.push(format!("All {} metrics within target", process.display_name()));
    }

    ProcessMetrics {
        process,
        process_name: process.display_name(),
        window_hours: agg.window_hours,
        row_count: agg.row_count,
        data_available: agg.has_data(),
        overall_status,
        metrics,
        recommendations,
        upstream_error: None,
    }
}

/// Fetch the aggregate for `process` and build its report.
///
/// A failed fetch is logged and yields an all-unavailable report.
pub async fn efficiency_report(
    store: &dyn PlantStore,
    config: &PlantConfig,
    process: ProcessType,
    window: Window,
) -> ProcessMetrics {
    match store.fetch_aggregate(process, window).await {
        Ok(agg) => {
            let report = compute_process_metrics(&agg, config);
            debug!(
                process = %process,
                window = %window,
                rows = agg.row_count,
                status = ?report.overall_status,
                "Process metrics computed"
            );
            report
        }
        Err(e) => {
            warn!(process = %process, window = %window, error = %e, "Aggregate fetch failed");
            ProcessMetrics::unavailable(process, window, config, e.to_string())
        }
    }
}

// ============================================================================
// Quality trends
// ============================================================================

/// Quality report with the headline grade.
#[derive(Debug, Clone, Serialize)]
pub struct QualityTrends {
    pub days: u32,
    /// "Excellent", "Good" or "Needs Attention"; `None` without data
    pub quality_status: Option<&'static str>,
    pub strength_meets_target: Option<bool>,
    pub fineness_within_band: Option<bool>,
    #[serde(flatten)]
    pub report: ProcessMetrics,
}

pub async fn quality_trends(
    store: &dyn PlantStore,
    config: &PlantConfig,
    window: Window,
) -> QualityTrends {
    let report = efficiency_report(store, config, ProcessType::Quality, window).await;
    let status_of = |kind| report.reading(kind).and_then(|r| r.status);

    QualityTrends {
        days: window.as_hours() / 24,
        quality_status: status_of(MetricKind::DefectRate).map(|s| match s {
            MetricStatus::Optimal => "Excellent",
            MetricStatus::Acceptable => "Good",
            MetricStatus::NeedsAttention => "Needs Attention",
        }),
        strength_meets_target: status_of(MetricKind::CompressiveStrength28d)
            .map(|s| s == MetricStatus::Optimal),
        fineness_within_band: status_of(MetricKind::Fineness).map(|s| s == MetricStatus::Optimal),
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn window() -> Window {
        Window::hours(24).unwrap()
    }

    fn kiln(fuel: Option<f64>, alt: Option<f64>) -> ProcessAggregate {
        let mut agg = ProcessAggregate::empty(ProcessType::Kiln, window());
        agg.row_count = 10;
        agg.avg_fuel_rate = fuel;
        agg.avg_alt_fuel_rate = alt;
        agg.avg_production = Some(100.0);
        agg.avg_temperature = Some(1450.0);
        agg.avg_o2_pct = Some(3.0);
        agg
    }

    #[test]
    fn every_key_present_without_data() {
        let config = PlantConfig::default();
        for process in ProcessType::ALL {
            let agg = ProcessAggregate::empty(process, window());
            let report = compute_process_metrics(&agg, &config);
            assert!(!report.data_available);
            assert_eq!(report.metrics.len(), metric_kinds(process).len());
            assert!(report.metrics.iter().all(|r| !r.available && r.value.is_none()));
            assert_eq!(report.overall_status, None);

            let json = serde_json::to_value(&report).unwrap();
            for kind in metric_kinds(process) {
                let entry = &json["metrics"][kind.key()];
                assert!(entry.is_object(), "missing {}", kind.key());
                assert!(entry["value"].is_null());
                assert_eq!(entry["available"], false);
            }
        }
    }

    #[test]
    fn zero_fuel_marks_kiln_ratios_unavailable() {
        let report = compute_process_metrics(&kiln(Some(0.0), Some(0.0)), &PlantConfig::default());
        for kind in [MetricKind::ThermalEfficiency, MetricKind::AlternativeFuelRate] {
            let r = report.reading(kind).unwrap();
            assert!(!r.available);
            assert_eq!(r.value, None);
        }
        // Measured values are still reported
        assert_eq!(report.value(MetricKind::BurningZoneTemperature), Some(1450.0));
    }

    #[test]
    fn low_alt_fuel_needs_attention() {
        let report = compute_process_metrics(&kiln(Some(15.0), Some(5.0)), &PlantConfig::default());
        let alt = report.reading(MetricKind::AlternativeFuelRate).unwrap();
        assert_eq!(alt.value, Some(25.0));
        assert_eq!(alt.status, Some(MetricStatus::NeedsAttention));
        assert_eq!(report.overall_status, Some(MetricStatus::NeedsAttention));
        assert!(report.recommendations.iter().any(|r| r.contains("25%")));
        assert_eq!(report.value(MetricKind::ThermalEfficiency), Some(8.0));
    }

    #[test]
    fn grinding_score_follows_specific_energy() {
        let mut agg = ProcessAggregate::empty(ProcessType::Grinding, window());
        agg.row_count = 5;
        agg.avg_power = Some(3300.0);
        agg.avg_feed_rate = Some(100.0);
        let report = compute_process_metrics(&agg, &PlantConfig::default());
        assert_eq!(report.value(MetricKind::SpecificEnergy), Some(33.0));
        assert_eq!(report.value(MetricKind::GrindingEfficiencyScore), Some(34.0));
        assert!(!report.reading(MetricKind::ProductFineness).unwrap().available);
        assert_eq!(report.overall_status, Some(MetricStatus::Optimal));
    }

    #[test]
    fn inconsistent_counts_are_not_a_rate() {
        let mut agg = ProcessAggregate::empty(ProcessType::Quality, window());
        agg.row_count = 3;
        agg.defect_count = Some(5);
        agg.total_samples = Some(3);
        let report = compute_process_metrics(&agg, &PlantConfig::default());
        let defect = report.reading(MetricKind::DefectRate).unwrap();
        assert!(!defect.available);
        assert!(defect.reason.as_deref().unwrap().contains("inconsistent"));
    }

    #[tokio::test]
    async fn upstream_failure_degrades_to_unavailable() {
        let store = MemoryStore::offline();
        let report =
            efficiency_report(&store, &PlantConfig::default(), ProcessType::Kiln, window()).await;
        assert!(report.upstream_error.is_some());
        assert_eq!(report.metrics.len(), 5);
        assert!(report.metrics.iter().all(|r| !r.available));
    }

    #[tokio::test]
    async fn quality_grade_from_defect_rate() {
        let store = MemoryStore::demo();
        let trends = quality_trends(&store, &PlantConfig::default(), Window::hours(168).unwrap()).await;
        // Demo data: 2 defects in 200 samples sits on the excellent edge
        assert_eq!(trends.quality_status, Some("Excellent"));
        assert_eq!(trends.days, 7);
        assert_eq!(trends.strength_meets_target, Some(true));
    }
}
