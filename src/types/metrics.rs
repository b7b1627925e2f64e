//! Derived metric identities, target bands and readings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every derived or averaged metric the engine reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    // Kiln
    ThermalEfficiency,
    AlternativeFuelRate,
    BurningZoneTemperature,
    ClinkerProduction,
    KilnOxygen,
    // Grinding
    SpecificEnergy,
    GrindingEfficiencyScore,
    ProductFineness,
    // Raw mix
    LimeSaturationFactor,
    SilicaModulus,
    AluminaModulus,
    // Quality
    DefectRate,
    CompressiveStrength28d,
    Fineness,
    So3,
    // Utilities
    SpecificPower,
    PowerDraw,
}

impl MetricKind {
    /// Stable response key.
    pub fn key(self) -> &'static str {
        match self {
            MetricKind::ThermalEfficiency => "thermal_efficiency",
            MetricKind::AlternativeFuelRate => "alternative_fuel_rate_pct",
            MetricKind::BurningZoneTemperature => "avg_burning_zone_temp_c",
            MetricKind::ClinkerProduction => "avg_production_tph",
            MetricKind::KilnOxygen => "kiln_o2_pct",
            MetricKind::SpecificEnergy => "specific_energy_kwh_per_ton",
            MetricKind::GrindingEfficiencyScore => "efficiency_score",
            MetricKind::ProductFineness => "avg_product_fineness_cm2_per_g",
            MetricKind::LimeSaturationFactor => "lsf",
            MetricKind::SilicaModulus => "silica_modulus",
            MetricKind::AluminaModulus => "alumina_modulus",
            MetricKind::DefectRate => "defect_rate_pct",
            MetricKind::CompressiveStrength28d => "avg_strength_28d_mpa",
            MetricKind::Fineness => "avg_fineness_cm2_per_g",
            MetricKind::So3 => "avg_so3_pct",
            MetricKind::SpecificPower => "specific_power_kwh_per_ton",
            MetricKind::PowerDraw => "avg_power_kw",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::ThermalEfficiency => "Thermal efficiency",
            MetricKind::AlternativeFuelRate => "Alternative fuel rate",
            MetricKind::BurningZoneTemperature => "Burning zone temperature",
            MetricKind::ClinkerProduction => "Clinker production",
            MetricKind::KilnOxygen => "Kiln inlet O2",
            MetricKind::SpecificEnergy => "Grinding specific energy",
            MetricKind::GrindingEfficiencyScore => "Grinding efficiency score",
            MetricKind::ProductFineness => "Mill product fineness",
            MetricKind::LimeSaturationFactor => "Lime saturation factor",
            MetricKind::SilicaModulus => "Silica modulus",
            MetricKind::AluminaModulus => "Alumina modulus",
            MetricKind::DefectRate => "Defect rate",
            MetricKind::CompressiveStrength28d => "28-day compressive strength",
            MetricKind::Fineness => "Blaine fineness",
            MetricKind::So3 => "SO3 content",
            MetricKind::SpecificPower => "Specific power consumption",
            MetricKind::PowerDraw => "Average power draw",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::ThermalEfficiency
            | MetricKind::LimeSaturationFactor
            | MetricKind::SilicaModulus
            | MetricKind::AluminaModulus => "",
            MetricKind::AlternativeFuelRate
            | MetricKind::KilnOxygen
            | MetricKind::DefectRate
            | MetricKind::So3 => "%",
            MetricKind::BurningZoneTemperature => "°C",
            MetricKind::ClinkerProduction => "t/h",
            MetricKind::SpecificEnergy | MetricKind::SpecificPower => "kWh/t",
            MetricKind::GrindingEfficiencyScore => "score",
            MetricKind::ProductFineness | MetricKind::Fineness => "cm²/g",
            MetricKind::CompressiveStrength28d => "MPa",
            MetricKind::PowerDraw => "kW",
        }
    }

    /// Render `value` with this metric's unit, e.g. `25%` or `38.4 kWh/t`.
    pub fn format_value(self, value: f64) -> String {
        let v = format_number(value);
        match self.unit() {
            "" => v,
            "%" => format!("{v}%"),
            unit => format!("{v} {unit}"),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Three-level ordinal status, worst last.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MetricStatus {
    Optimal,
    Acceptable,
    NeedsAttention,
}

impl MetricStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricStatus::Optimal => "optimal",
            MetricStatus::Acceptable => "acceptable",
            MetricStatus::NeedsAttention => "needs-attention",
        }
    }
}

impl fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target band for a metric.
///
/// `min`/`max` bound the optimal region, `acceptable_min`/`acceptable_max`
/// an outer acceptable region. All edges are inclusive. A band with no
/// bounds at all is informational and always evaluates as optimal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetBand {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub acceptable_min: Option<f64>,
    pub acceptable_max: Option<f64>,
}

impl TargetBand {
    pub const fn informational() -> Self {
        Self {
            min: None,
            max: None,
            acceptable_min: None,
            acceptable_max: None,
        }
    }

    pub const fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            ..Self::informational()
        }
    }

    pub const fn at_most(max: f64) -> Self {
        Self {
            max: Some(max),
            ..Self::informational()
        }
    }

    pub const fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::informational()
        }
    }

    /// Add an outer acceptable region.
    pub const fn with_acceptable(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.acceptable_min = min;
        self.acceptable_max = max;
        self
    }

    pub fn is_informational(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn has_acceptable_region(&self) -> bool {
        self.acceptable_min.is_some() || self.acceptable_max.is_some()
    }
}

impl fmt::Display for TargetBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bounds(f, self.min, self.max, "informational")?;
        if self.has_acceptable_region() {
            f.write_str(" (acceptable ")?;
            write_bounds(f, self.acceptable_min, self.acceptable_max, "any")?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

fn write_bounds(
    f: &mut fmt::Formatter<'_>,
    min: Option<f64>,
    max: Option<f64>,
    unbounded: &str,
) -> fmt::Result {
    match (min, max) {
        (Some(lo), Some(hi)) => write!(f, "{}-{}", format_number(lo), format_number(hi)),
        (Some(lo), None) => write!(f, ">= {}", format_number(lo)),
        (None, Some(hi)) => write!(f, "<= {}", format_number(hi)),
        (None, None) => f.write_str(unbounded),
    }
}

/// Round to two decimals and drop trailing zeros (`91.20` → `91.2`).
pub fn format_number(value: f64) -> String {
    format!("{}", round2(value))
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One metric in a report: either a value with its evaluation, or an
/// explicit unavailable marker. Every field is always serialized so clients
/// see a stable schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReading {
    pub name: &'static str,
    #[serde(skip)]
    pub kind: MetricKind,
    pub label: &'static str,
    pub unit: &'static str,
    pub value: Option<f64>,
    pub available: bool,
    pub reason: Option<String>,
    pub target: TargetBand,
    pub target_text: String,
    pub status: Option<MetricStatus>,
    pub message: String,
}
