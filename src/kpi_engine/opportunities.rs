//! Plant-wide opportunity aggregation
//!
//! Builds every process report, then turns each out-of-band reading that has
//! a catalogue entry into an [`Opportunity`] with a fixed savings estimate.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::report::{efficiency_report, ProcessMetrics};
use super::EngineError;
use crate::config::{PlantConfig, Ranking};
use crate::store::PlantStore;
use crate::types::{MetricStatus, Opportunity, ProcessType, Window};

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityReport {
    pub opportunities: Vec<Opportunity>,
    pub total_estimated_savings: f64,
    pub currency: String,
    pub ranking: Ranking,
    /// Processes whose data could not be read or held no rows
    pub unavailable_processes: Vec<ProcessType>,
    pub generated_at: DateTime<Utc>,
}

/// Opportunities from metric readings, in process then metric order.
///
/// Every non-optimal reading takes its catalogue priority unchanged.
/// Standing items are not included.
pub fn detect_opportunities(reports: &[ProcessMetrics], config: &PlantConfig) -> Vec<Opportunity> {
    let catalog = &config.opportunities.catalog;
    let mut found = Vec::new();

    for report in reports {
        for reading in &report.metrics {
            let (Some(value), Some(status)) = (reading.value, reading.status) else {
                continue;
            };
            if status == MetricStatus::Optimal {
                continue;
            }
            let Some(entry) = catalog.get(&reading.kind) else {
                continue;
            };
            found.push(Opportunity {
                category: entry.category.clone(),
                description: format!(
                    "{} from {} to {}",
                    entry.action,
                    reading.kind.format_value(value),
                    entry.goal
                ),
                estimated_savings: entry.estimated_savings,
                currency: config.plant.currency.clone(),
                priority: entry.priority,
                implementation_difficulty: entry.difficulty,
                source_metric: Some(reading.kind),
                source_status: Some(status),
            });
        }
    }
    found
}

/// Standing opportunities from config, if enabled.
pub fn standing_opportunities(config: &PlantConfig) -> Vec<Opportunity> {
    if !config.opportunities.include_standing {
        return Vec::new();
    }
    config
        .opportunities
        .standing
        .iter()
        .map(|s| Opportunity {
            category: s.category.clone(),
            description: s.description.clone(),
            estimated_savings: s.estimated_savings,
            currency: config.plant.currency.clone(),
            priority: s.priority,
            implementation_difficulty: s.difficulty,
            source_metric: None,
            source_status: None,
        })
        .collect()
}

/// Order opportunities in place.
///
/// `Priority` sorts by priority then savings, both descending; the sort is
/// stable so equal items keep detection order. `Insertion` leaves the list
/// as detected.
pub fn rank(opportunities: &mut [Opportunity], ranking: Ranking) {
    if ranking == Ranking::Priority {
        opportunities.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.estimated_savings.total_cmp(&a.estimated_savings))
        });
    }
}

/// Assemble the full report from already-built process reports. Pure.
pub fn build_report(reports: &[ProcessMetrics], config: &PlantConfig) -> OpportunityReport {
    let mut opportunities = detect_opportunities(reports, config);
    opportunities.extend(standing_opportunities(config));
    rank(&mut opportunities, config.opportunities.ranking);

    OpportunityReport {
        total_estimated_savings: opportunities.iter().map(|o| o.estimated_savings).sum(),
        currency: config.plant.currency.clone(),
        ranking: config.opportunities.ranking,
        unavailable_processes: reports
            .iter()
            .filter(|r| !r.data_available)
            .map(|r| r.process)
            .collect(),
        generated_at: Utc::now(),
        opportunities,
    }
}

/// Fetch every process concurrently and aggregate opportunities.
///
/// Quality uses its own (longer) lookback; the rest share one window.
pub async fn find_opportunities(
    store: &dyn PlantStore,
    config: &PlantConfig,
) -> Result<OpportunityReport, EngineError> {
    let max = config.formulas.max_window_hours;
    let window = Window::hours_clamped(i64::from(config.opportunities.lookback_hours), max)?;
    let quality_window =
        Window::hours_clamped(i64::from(config.opportunities.quality_lookback_hours), max)?;

    let reports = join_all(ProcessType::ALL.into_iter().map(|process| {
        let w = if process == ProcessType::Quality {
            quality_window
        } else {
            window
        };
        efficiency_report(store, config, process, w)
    }))
    .await;

    let report = build_report(&reports, config);
    if !report.unavailable_processes.is_empty() {
        warn!(
            processes = ?report.unavailable_processes,
            "Opportunity scan ran without data for some processes"
        );
    }
    info!(
        count = report.opportunities.len(),
        total_savings = report.total_estimated_savings,
        "Opportunity scan complete"
    );
    Ok(report)
}
