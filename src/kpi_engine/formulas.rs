//! Derived-metric formulas
//!
//! Every input is an `Option<f64>` straight from a [`ProcessAggregate`];
//! `None` means the store had no value. A formula with a missing input or a
//! non-positive denominator returns [`NotComputable`], never zero.
//!
//! [`ProcessAggregate`]: crate::types::ProcessAggregate

use serde::Serialize;
use std::fmt;

/// Why a derived metric has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum NotComputable {
    /// The window held no rows at all
    NoRows,
    /// The data store call failed
    StoreUnavailable,
    MissingInput(&'static str),
    NonPositiveDenominator(&'static str),
    /// Inputs contradict each other (more defects than samples)
    InconsistentInput(&'static str),
}

impl fmt::Display for NotComputable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotComputable::NoRows => f.write_str("no data in window"),
            NotComputable::StoreUnavailable => f.write_str("data store unavailable"),
            NotComputable::MissingInput(field) => write!(f, "insufficient data: no {field} in window"),
            NotComputable::NonPositiveDenominator(field) => {
                write!(f, "not computable: {field} is zero or negative")
            }
            NotComputable::InconsistentInput(what) => write!(f, "inconsistent data: {what}"),
        }
    }
}

pub type Computed = Result<f64, NotComputable>;

/// A directly averaged value, present and finite.
pub fn measured(value: Option<f64>, field: &'static str) -> Computed {
    require(value, field)
}

fn require(value: Option<f64>, field: &'static str) -> Computed {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(NotComputable::MissingInput(field)),
    }
}

fn positive(value: f64, field: &'static str) -> Computed {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(NotComputable::NonPositiveDenominator(field))
    }
}

// ============================================================================
// Kiln
// ============================================================================

/// Kiln thermal efficiency
///
/// `production × factor / (fuel + alt_fuel)`, all rates in t/h. The factor
/// is a plant-specific kcal/kg conversion (1.6 by default).
pub fn thermal_efficiency(
    production: Option<f64>,
    fuel: Option<f64>,
    alt_fuel: Option<f64>,
    factor: f64,
) -> Computed {
    let production = require(production, "clinker production")?;
    let total = positive(total_fuel(fuel, alt_fuel)?, "total fuel feed")?;
    Ok(production * factor / total)
}

/// Alternative fuel share of total fuel feed (%), also reported as TSR.
pub fn alternative_fuel_rate(fuel: Option<f64>, alt_fuel: Option<f64>) -> Computed {
    let alt = require(alt_fuel, "alternative fuel feed")?;
    let total = positive(total_fuel(fuel, alt_fuel)?, "total fuel feed")?;
    Ok(alt / total * 100.0)
}

fn total_fuel(fuel: Option<f64>, alt_fuel: Option<f64>) -> Computed {
    Ok(require(fuel, "fuel feed")? + require(alt_fuel, "alternative fuel feed")?)
}

// ============================================================================
// Grinding
// ============================================================================

/// Grinding specific energy (kWh/t) = power / feed rate.
pub fn specific_energy(power_kw: Option<f64>, feed_rate_tph: Option<f64>) -> Computed {
    let power = require(power_kw, "mill power")?;
    let feed = positive(require(feed_rate_tph, "mill feed rate")?, "mill feed rate")?;
    Ok(power / feed)
}

/// Fixed linear scoring curve, not a calibration:
/// `clamp((reference − specific_energy) × slope, 0, 100)`.
///
/// Defaults put 50 kWh/t at 0 and 0 kWh/t at 100.
pub fn grinding_efficiency_score(specific_energy: f64, reference: f64, slope: f64) -> f64 {
    ((reference - specific_energy) * slope).clamp(0.0, 100.0)
}

// ============================================================================
// Quality
// ============================================================================

/// Defect rate (%) = defects / samples × 100.
pub fn defect_rate(defect_count: Option<u64>, total_samples: Option<u64>) -> Computed {
    let total = total_samples.ok_or(NotComputable::MissingInput("sample count"))?;
    let defects = defect_count.ok_or(NotComputable::MissingInput("defect count"))?;
    if total == 0 {
        return Err(NotComputable::NonPositiveDenominator("sample count"));
    }
    if defects > total {
        return Err(NotComputable::InconsistentInput("defect count exceeds sample count"));
    }
    Ok(defects as f64 / total as f64 * 100.0)
}

// ============================================================================
// Raw Mix
// ============================================================================

/// Lime saturation factor, as a percentage:
/// `100 × CaO / (2.8·SiO2 + 1.2·Al2O3 + 0.65·Fe2O3)`.
pub fn lime_saturation_factor(
    cao: Option<f64>,
    sio2: Option<f64>,
    al2o3: Option<f64>,
    fe2o3: Option<f64>,
) -> Computed {
    let cao = require(cao, "CaO")?;
    let denom = 2.8 * require(sio2, "SiO2")?
        + 1.2 * require(al2o3, "Al2O3")?
        + 0.65 * require(fe2o3, "Fe2O3")?;
    Ok(100.0 * cao / positive(denom, "LSF denominator")?)
}

/// Silica modulus = SiO2 / (Al2O3 + Fe2O3).
pub fn silica_modulus(sio2: Option<f64>, al2o3: Option<f64>, fe2o3: Option<f64>) -> Computed {
    let sio2 = require(sio2, "SiO2")?;
    let denom = require(al2o3, "Al2O3")? + require(fe2o3, "Fe2O3")?;
    Ok(sio2 / positive(denom, "Al2O3 + Fe2O3")?)
}

/// Alumina modulus = Al2O3 / Fe2O3.
pub fn alumina_modulus(al2o3: Option<f64>, fe2o3: Option<f64>) -> Computed {
    let al2o3 = require(al2o3, "Al2O3")?;
    let fe2o3 = positive(require(fe2o3, "Fe2O3")?, "Fe2O3")?;
    Ok(al2o3 / fe2o3)
}

// ============================================================================
// Utilities
// ============================================================================

/// Specific power (kWh/t) = utility power draw / plant output.
pub fn specific_power(power_kw: Option<f64>, production_tph: Option<f64>) -> Computed {
    let power = require(power_kw, "utility power")?;
    let production = positive(require(production_tph, "production")?, "production")?;
    Ok(power / production)
}
