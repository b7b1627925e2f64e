//! Headline KPI summary
//!
//! Four plant-level percentages derived from the kiln, grinding and quality
//! reports over the standard lookback.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::report::{efficiency_report, ProcessMetrics};
use super::EngineError;
use crate::config::PlantConfig;
use crate::store::PlantStore;
use crate::types::{round2, MetricKind, ProcessType, Window};

/// One KPI value against its target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub value: Option<f64>,
    pub target: f64,
    pub unit: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Kpi {
    fn from_source(value: Option<f64>, target: f64, missing: &str) -> Self {
        match value {
            Some(v) => Self {
                value: Some(round2(v)),
                target,
                unit: "%",
                available: true,
                reason: None,
            },
            None => Self {
                value: None,
                target,
                unit: "%",
                available: false,
                reason: Some(format!("{missing} unavailable")),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiSummary {
    /// Clinker output as a share of nominal throughput
    pub production_efficiency: Kpi,
    /// `max(0, 100 − specific energy)`
    pub energy_efficiency: Kpi,
    /// `100 − defect rate`
    pub quality_score: Kpi,
    pub alternative_fuel_rate: Kpi,
    pub window_hours: u32,
    pub generated_at: DateTime<Utc>,
}

/// Quality score target (%).
const QUALITY_SCORE_TARGET: f64 = 99.0;

/// Derive KPIs from process reports. Pure.
pub fn summarize(
    kiln: &ProcessMetrics,
    grinding: &ProcessMetrics,
    quality: &ProcessMetrics,
    config: &PlantConfig,
) -> KpiSummary {
    let target_tph = config.formulas.production_target_tph;
    let production = kiln
        .value(MetricKind::ClinkerProduction)
        .filter(|_| target_tph > 0.0)
        .map(|tph| tph / target_tph * 100.0);
    let energy = grinding
        .value(MetricKind::SpecificEnergy)
        .map(|se| (100.0 - se).max(0.0));
    let quality_score = quality.value(MetricKind::DefectRate).map(|rate| 100.0 - rate);

    KpiSummary {
        production_efficiency: Kpi::from_source(production, 100.0, "Clinker production"),
        energy_efficiency: Kpi::from_source(energy, 100.0, "Grinding specific energy"),
        quality_score: Kpi::from_source(quality_score, QUALITY_SCORE_TARGET, "Defect rate"),
        alternative_fuel_rate: Kpi::from_source(
            kiln.value(MetricKind::AlternativeFuelRate),
            config.targets.alt_fuel_min_pct,
            "Alternative fuel rate",
        ),
        window_hours: kiln.window_hours,
        generated_at: Utc::now(),
    }
}

/// Fetch the three source processes concurrently and summarise.
pub async fn kpi_summary(
    store: &dyn PlantStore,
    config: &PlantConfig,
) -> Result<KpiSummary, EngineError> {
    let window = Window::hours_clamped(
        i64::from(config.opportunities.lookback_hours),
        config.formulas.max_window_hours,
    )?;
    let (kiln, grinding, quality) = futures::join!(
        efficiency_report(store, config, ProcessType::Kiln, window),
        efficiency_report(store, config, ProcessType::Grinding, window),
        efficiency_report(store, config, ProcessType::Quality, window),
    );
    Ok(summarize(&kiln, &grinding, &quality, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn demo_kpis() {
        let summary = kpi_summary(&MemoryStore::demo(), &PlantConfig::default())
            .await
            .unwrap();
        // 180 t/h against 100 t/h nominal
        assert_eq!(summary.production_efficiency.value, Some(180.0));
        // 3960 kW / 120 t/h = 33 kWh/t
        assert_eq!(summary.energy_efficiency.value, Some(67.0));
        assert_eq!(summary.quality_score.value, Some(99.0));
        assert_eq!(summary.alternative_fuel_rate.value, Some(25.0));
        assert_eq!(summary.alternative_fuel_rate.target, 30.0);
        assert_eq!(summary.window_hours, 24);
    }

    #[tokio::test]
    async fn missing_data_is_unavailable_not_zero() {
        let summary = kpi_summary(&MemoryStore::new(), &PlantConfig::default())
            .await
            .unwrap();
        for kpi in [
            &summary.production_efficiency,
            &summary.energy_efficiency,
            &summary.quality_score,
            &summary.alternative_fuel_rate,
        ] {
            assert_eq!(kpi.value, None);
            assert!(!kpi.available);
            assert!(kpi.reason.is_some());
        }
    }

    #[test]
    fn energy_efficiency_floors_at_zero() {
        let config = PlantConfig::default();
        let window = Window::default();
        let mut grinding = crate::types::ProcessAggregate::empty(ProcessType::Grinding, window);
        grinding.row_count = 1;
        grinding.avg_power = Some(15_000.0);
        grinding.avg_feed_rate = Some(100.0);
        let empty = |p| {
            super::super::compute_process_metrics(
                &crate::types::ProcessAggregate::empty(p, window),
                &config,
            )
        };
        let summary = summarize(
            &empty(ProcessType::Kiln),
            &super::super::compute_process_metrics(&grinding, &config),
            &empty(ProcessType::Quality),
            &config,
        );
        assert_eq!(summary.energy_efficiency.value, Some(0.0));
    }
}
