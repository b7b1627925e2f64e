//! Config validation: unknown-key detection with Levenshtein suggestions
//! and plausibility checks on plant targets.
//!
//! Raw TOML is first parsed into `toml::Value` and its key tree compared
//! against the known field names. Unknown keys produce warnings with a
//! "did you mean?" suggestion and never break an existing config.

use std::collections::HashSet;

use super::PlantConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Prefix under which any metric key may appear as a sub-table.
const CATALOG_PREFIX: &str = "opportunities.catalog.";

/// Fields allowed inside each `[opportunities.catalog.<metric>]` table.
const CATALOG_FIELDS: &[&str] = &[
    "category",
    "action",
    "goal",
    "estimated_savings",
    "priority",
    "difficulty",
];

/// Every valid dotted key path for `PlantConfig`.
///
/// Must follow the struct hierarchy in plant_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [plant]
        "plant",
        "plant.name",
        "plant.currency",
        // [server]
        "server",
        "server.bind_address",
        "server.cors_origins",
        "server.request_timeout_secs",
        // [database]
        "database",
        "database.url",
        "database.max_connections",
        "database.acquire_timeout_secs",
        "database.query_timeout_secs",
        "database.run_migrations",
        // [formulas]
        "formulas",
        "formulas.thermal_conversion_factor",
        "formulas.efficiency_score_reference_kwh_t",
        "formulas.efficiency_score_slope",
        "formulas.production_target_tph",
        "formulas.max_window_hours",
        // [targets]
        "targets",
        "targets.alt_fuel_min_pct",
        "targets.specific_energy_max_kwh_t",
        "targets.strength_28d_min_mpa",
        "targets.fineness_min_cm2_g",
        "targets.fineness_max_cm2_g",
        "targets.defect_rate_excellent_pct",
        "targets.defect_rate_acceptable_pct",
        "targets.lsf_min",
        "targets.lsf_max",
        "targets.silica_modulus_min",
        "targets.silica_modulus_max",
        "targets.alumina_modulus_min",
        "targets.alumina_modulus_max",
        "targets.kiln_o2_min_pct",
        "targets.kiln_o2_max_pct",
        // [opportunities]
        "opportunities",
        "opportunities.lookback_hours",
        "opportunities.quality_lookback_hours",
        "opportunities.ranking",
        "opportunities.include_standing",
        "opportunities.catalog",
        "opportunities.standing",
        // [chat]
        "chat",
        "chat.max_requests_per_minute",
        "chat.max_requests_per_hour",
        "chat.max_message_length",
        "chat.history_window",
        "chat.max_tool_rounds",
        "chat.max_daily_cost_usd",
        "chat.cost_per_1k_tokens_usd",
        // [llm]
        "llm",
        "llm.endpoint",
        "llm.model",
        "llm.api_key_env",
        "llm.temperature",
        "llm.request_timeout_secs",
    ];
    keys.iter().copied().collect()
}

/// Catalogue tables are keyed by metric; any metric name is accepted as the
/// table name and only its fields are checked.
fn is_known_catalog_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix(CATALOG_PREFIX) else {
        return false;
    };
    match rest.split_once('.') {
        None => true,
        Some((_metric, field)) => CATALOG_FIELDS.contains(&field),
    }
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        // Ties resolved alphabetically so the suggestion is deterministic
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // serde reports parse errors
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()) && !is_known_catalog_key(key))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Plausibility Checks
// ============================================================================

/// Flag values that parse and validate but look wrong for a cement plant.
pub fn plausibility_warnings(config: &PlantConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut check = |field: &str, value: f64, lo: f64, hi: f64, unit: &str| {
        if value < lo || value > hi {
            warnings.push(ValidationWarning {
                field: field.to_string(),
                message: format!(
                    "{field} = {value} is outside the typical range ({lo}-{hi}{unit})"
                ),
                suggestion: None,
            });
        }
    };

    let t = &config.targets;
    check("targets.alt_fuel_min_pct", t.alt_fuel_min_pct, 5.0, 80.0, " %");
    check("targets.specific_energy_max_kwh_t", t.specific_energy_max_kwh_t, 15.0, 60.0, " kWh/t");
    check("targets.strength_28d_min_mpa", t.strength_28d_min_mpa, 32.5, 62.5, " MPa");
    check("targets.lsf_min", t.lsf_min, 85.0, 100.0, "");
    check("targets.lsf_max", t.lsf_max, 85.0, 102.0, "");
    check("formulas.production_target_tph", config.formulas.production_target_tph, 10.0, 1000.0, " t/h");

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("kiln", "kiln"), 0);
        assert_eq!(levenshtein("finenes", "fineness"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [targets]
            lsf_min = 92.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"targets".to_string()));
        assert!(keys.contains(&"targets.lsf_min".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[targets]
alt_fuel_mni_pct = 30.0
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "targets.alt_fuel_mni_pct");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("targets.alt_fuel_min_pct")
        );
    }

    #[test]
    fn test_valid_keys_produce_zero_warnings() {
        let warnings = validate_unknown_keys(
            r#"
[plant]
name = "Jharli"

[server]
cors_origins = ["http://localhost:3000"]

[opportunities]
ranking = "priority"

[opportunities.catalog.specific_energy]
category = "Energy Optimization"
action = "Reduce grinding specific energy"
goal = "<35 kWh/ton"
estimated_savings = 80000.0
priority = "High"
difficulty = "Medium"

[[opportunities.standing]]
category = "Predictive Maintenance"
description = "x"
estimated_savings = 1.0
priority = "High"
difficulty = "High"
"#,
        );
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_catalog_field_flagged() {
        let warnings = validate_unknown_keys(
            r#"
[opportunities.catalog.specific_energy]
savings = 1.0
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.ends_with(".savings"));
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[kiln_tuning]\nspeed = 4\n");
        assert!(warnings.iter().any(|w| w.field == "kiln_tuning"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_plausibility_defaults_clean() {
        let warnings = plausibility_warnings(&PlantConfig::default());
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_plausibility_flags_odd_target() {
        let mut config = PlantConfig::default();
        config.targets.alt_fuel_min_pct = 95.0;
        let warnings = plausibility_warnings(&config);
        assert!(warnings.iter().any(|w| w.field == "targets.alt_fuel_min_pct"));
    }
}
