//! Target-band evaluation
//!
//! Straight band comparison into a three-level status. Band edges count as
//! inside (a defect rate of exactly 1.0 against `<= 1` is optimal).

use serde::Serialize;

use crate::types::{MetricKind, MetricStatus, TargetBand};

/// Result of comparing one value against its band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub status: MetricStatus,
    pub message: String,
}

/// Evaluate `value` for `kind` against `band`.
///
/// Messages are fixed templates over the rounded value and the band text,
/// so identical inputs always produce identical output.
pub fn evaluate(kind: MetricKind, value: f64, band: &TargetBand) -> Evaluation {
    let status = classify(value, band);
    let shown = kind.format_value(value);
    let label = kind.label();

    let message = if band.is_informational() {
        format!("{label} at {shown} (informational, no target band)")
    } else {
        match status {
            MetricStatus::Optimal => format!("{label} at {shown} is within target ({band})"),
            MetricStatus::Acceptable => format!("{label} at {shown} is acceptable; target {band}"),
            MetricStatus::NeedsAttention => {
                format!("{label} at {shown} needs attention; target {band}")
            }
        }
    };

    Evaluation { status, message }
}

/// Status only, without building the message.
pub fn classify(value: f64, band: &TargetBand) -> MetricStatus {
    if band.is_informational() {
        return MetricStatus::Optimal;
    }
    if within(value, band.min, band.max) {
        return MetricStatus::Optimal;
    }
    if band.has_acceptable_region()
        && within(
            value,
            band.acceptable_min.or(band.min),
            band.acceptable_max.or(band.max),
        )
    {
        return MetricStatus::Acceptable;
    }
    MetricStatus::NeedsAttention
}

fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    // NaN fails every comparison and lands in needs-attention
    min.map_or(!value.is_nan(), |lo| value >= lo) && max.map_or(!value.is_nan(), |hi| value <= hi)
}
