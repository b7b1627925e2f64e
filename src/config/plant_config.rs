//! Plant Configuration - targets, formula constants and service settings as TOML
//!
//! Every target band and savings figure the engine uses is a field here.
//! Each struct implements `Default` with the plant's standard values, so a
//! missing config file yields the stock behaviour.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::{Difficulty, MetricKind, Priority, TargetBand};

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "CEMENT_OPS_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "plant_config.toml";

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({0}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one plant deployment.
///
/// Load with `PlantConfig::load()` which searches:
/// 1. an explicit path (CLI `--config`)
/// 2. `$CEMENT_OPS_CONFIG`
/// 3. `./plant_config.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantConfig {
    #[serde(default)]
    pub plant: PlantInfo,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub formulas: FormulaConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
    #[serde(default)]
    pub opportunities: OpportunityConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl PlantConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path that cannot be loaded is an error. A discovered file
    /// that fails to load is logged and the defaults are used instead.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), plant = %config.plant.name, "Loaded plant config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), plant = %config.plant.name, "Loaded plant config from {CONFIG_ENV_VAR}");
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(plant = %config.plant.name, "Loaded plant config from ./{LOCAL_CONFIG_FILE}");
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        for w in super::validation::plausibility_warnings(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Apply environment overrides on top of the file/default values.
    ///
    /// `DATABASE_URL`, `BIND_ADDRESS`, `PORT` (set by container platforms),
    /// `CORS_ORIGINS` (comma-separated) and the LLM key variable named by
    /// `llm.api_key_env`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            if !addr.trim().is_empty() {
                self.server.bind_address = addr;
            }
        } else if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.bind_address = format!("0.0.0.0:{p}"),
                Err(_) => warn!(port = %port, "Ignoring unparseable PORT"),
            }
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = parse_origins(&origins);
        }
        if let Ok(key) = std::env::var(&self.llm.api_key_env) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
    }

    /// Validate targets and limits for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let t = &self.targets;

        check_range(t.fineness_min_cm2_g, t.fineness_max_cm2_g, "targets.fineness", &mut errors);
        check_range(t.lsf_min, t.lsf_max, "targets.lsf", &mut errors);
        check_range(t.silica_modulus_min, t.silica_modulus_max, "targets.silica_modulus", &mut errors);
        check_range(t.alumina_modulus_min, t.alumina_modulus_max, "targets.alumina_modulus", &mut errors);
        check_range(t.kiln_o2_min_pct, t.kiln_o2_max_pct, "targets.kiln_o2", &mut errors);

        if t.defect_rate_excellent_pct > t.defect_rate_acceptable_pct {
            errors.push(format!(
                "targets.defect_rate_excellent_pct ({}) must be <= defect_rate_acceptable_pct ({})",
                t.defect_rate_excellent_pct, t.defect_rate_acceptable_pct
            ));
        }
        if !(0.0..=100.0).contains(&t.alt_fuel_min_pct) {
            errors.push(format!(
                "targets.alt_fuel_min_pct = {} must be within 0-100",
                t.alt_fuel_min_pct
            ));
        }

        let f = &self.formulas;
        if f.thermal_conversion_factor <= 0.0 {
            errors.push("formulas.thermal_conversion_factor must be > 0".to_string());
        }
        if f.efficiency_score_slope <= 0.0 {
            errors.push("formulas.efficiency_score_slope must be > 0".to_string());
        }
        if f.production_target_tph <= 0.0 {
            errors.push("formulas.production_target_tph must be > 0 (used as divisor)".to_string());
        }
        if f.max_window_hours == 0 {
            errors.push("formulas.max_window_hours must be > 0".to_string());
        }

        let o = &self.opportunities;
        if o.lookback_hours == 0 || o.quality_lookback_hours == 0 {
            errors.push("opportunities lookback windows must be > 0".to_string());
        }
        for (kind, entry) in &o.catalog {
            if entry.estimated_savings < 0.0 {
                errors.push(format!(
                    "opportunities.catalog.{kind}.estimated_savings cannot be negative"
                ));
            }
        }

        if self.database.query_timeout_secs == 0 {
            errors.push("database.query_timeout_secs must be > 0".to_string());
        }
        if self.chat.max_requests_per_minute == 0 || self.chat.max_requests_per_hour == 0 {
            errors.push("chat request limits must be > 0".to_string());
        }
        if self.chat.max_requests_per_minute > self.chat.max_requests_per_hour {
            errors.push(format!(
                "chat.max_requests_per_minute ({}) cannot exceed max_requests_per_hour ({})",
                self.chat.max_requests_per_minute, self.chat.max_requests_per_hour
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn check_range(min: f64, max: f64, name: &str, errors: &mut Vec<String>) {
    if min > max {
        errors.push(format!("{name}: min ({min}) must be <= max ({max})"));
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Plant / Server / Database
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantInfo {
    pub name: String,
    /// Currency code for savings estimates
    pub currency: String,
}

impl Default for PlantInfo {
    fn default() -> Self {
        Self {
            name: "Cement Plant".to_string(),
            currency: "INR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::DEFAULT_BIND_ADDRESS.to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            request_timeout_secs: defaults::HTTP_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; empty runs without a data store
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub query_timeout_secs: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: defaults::POOL_MAX_CONNECTIONS,
            acquire_timeout_secs: defaults::POOL_ACQUIRE_TIMEOUT_SECS,
            query_timeout_secs: defaults::QUERY_TIMEOUT_SECS,
            run_migrations: true,
        }
    }
}

// ============================================================================
// Formulas & Targets
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    pub thermal_conversion_factor: f64,
    pub efficiency_score_reference_kwh_t: f64,
    pub efficiency_score_slope: f64,
    pub production_target_tph: f64,
    pub max_window_hours: u32,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            thermal_conversion_factor: defaults::THERMAL_CONVERSION_FACTOR,
            efficiency_score_reference_kwh_t: defaults::EFFICIENCY_SCORE_REFERENCE_KWH_T,
            efficiency_score_slope: defaults::EFFICIENCY_SCORE_SLOPE,
            production_target_tph: defaults::PRODUCTION_TARGET_TPH,
            max_window_hours: defaults::MAX_WINDOW_HOURS,
        }
    }
}

/// Target bands per metric. Edges are inclusive on the good side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub alt_fuel_min_pct: f64,
    pub specific_energy_max_kwh_t: f64,
    pub strength_28d_min_mpa: f64,
    pub fineness_min_cm2_g: f64,
    pub fineness_max_cm2_g: f64,
    pub defect_rate_excellent_pct: f64,
    pub defect_rate_acceptable_pct: f64,
    pub lsf_min: f64,
    pub lsf_max: f64,
    pub silica_modulus_min: f64,
    pub silica_modulus_max: f64,
    pub alumina_modulus_min: f64,
    pub alumina_modulus_max: f64,
    pub kiln_o2_min_pct: f64,
    pub kiln_o2_max_pct: f64,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            alt_fuel_min_pct: 30.0,
            specific_energy_max_kwh_t: 35.0,
            strength_28d_min_mpa: 42.5,
            fineness_min_cm2_g: 3200.0,
            fineness_max_cm2_g: 3600.0,
            defect_rate_excellent_pct: 1.0,
            defect_rate_acceptable_pct: 5.0,
            lsf_min: 92.0,
            lsf_max: 96.0,
            silica_modulus_min: 2.3,
            silica_modulus_max: 2.7,
            alumina_modulus_min: 1.3,
            alumina_modulus_max: 1.7,
            kiln_o2_min_pct: 2.0,
            kiln_o2_max_pct: 4.0,
        }
    }
}

impl TargetsConfig {
    /// Target band for a metric. Metrics without a target are informational.
    pub fn band(&self, kind: MetricKind) -> TargetBand {
        match kind {
            MetricKind::AlternativeFuelRate => TargetBand::at_least(self.alt_fuel_min_pct),
            MetricKind::SpecificEnergy => TargetBand::at_most(self.specific_energy_max_kwh_t),
            MetricKind::CompressiveStrength28d => TargetBand::at_least(self.strength_28d_min_mpa),
            MetricKind::Fineness => {
                TargetBand::range(self.fineness_min_cm2_g, self.fineness_max_cm2_g)
            }
            MetricKind::DefectRate => TargetBand::at_most(self.defect_rate_excellent_pct)
                .with_acceptable(None, Some(self.defect_rate_acceptable_pct)),
            MetricKind::LimeSaturationFactor => TargetBand::range(self.lsf_min, self.lsf_max),
            MetricKind::SilicaModulus => {
                TargetBand::range(self.silica_modulus_min, self.silica_modulus_max)
            }
            MetricKind::AluminaModulus => {
                TargetBand::range(self.alumina_modulus_min, self.alumina_modulus_max)
            }
            MetricKind::KilnOxygen => TargetBand::range(self.kiln_o2_min_pct, self.kiln_o2_max_pct),
            MetricKind::ThermalEfficiency
            | MetricKind::BurningZoneTemperature
            | MetricKind::ClinkerProduction
            | MetricKind::GrindingEfficiencyScore
            | MetricKind::ProductFineness
            | MetricKind::So3
            | MetricKind::SpecificPower
            | MetricKind::PowerDraw => TargetBand::informational(),
        }
    }
}

// ============================================================================
// Opportunities
// ============================================================================

/// How the aggregator orders its output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    /// Priority descending, then estimated savings descending
    #[default]
    Priority,
    /// Process iteration order, as detected
    Insertion,
}

/// Lookup-table entry turning an out-of-band metric into an opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub category: String,
    /// Leading verb phrase, e.g. "Increase alternative fuel rate"
    pub action: String,
    /// Goal text appended after the current value, e.g. "35% target"
    pub goal: String,
    pub estimated_savings: f64,
    pub priority: Priority,
    pub difficulty: Difficulty,
}

/// Opportunity that is always reported regardless of metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingOpportunity {
    pub category: String,
    pub description: String,
    pub estimated_savings: f64,
    pub priority: Priority,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityConfig {
    pub lookback_hours: u32,
    pub quality_lookback_hours: u32,
    pub ranking: Ranking,
    pub include_standing: bool,
    pub catalog: BTreeMap<MetricKind, CatalogEntry>,
    pub standing: Vec<StandingOpportunity>,
}

impl Default for OpportunityConfig {
    fn default() -> Self {
        Self {
            lookback_hours: defaults::DEFAULT_LOOKBACK_HOURS,
            quality_lookback_hours: defaults::DEFAULT_QUALITY_LOOKBACK_HOURS,
            ranking: Ranking::default(),
            include_standing: true,
            catalog: default_catalog(),
            standing: default_standing(),
        }
    }
}

fn entry(
    category: &str,
    action: &str,
    goal: &str,
    estimated_savings: f64,
    priority: Priority,
    difficulty: Difficulty,
) -> CatalogEntry {
    CatalogEntry {
        category: category.to_string(),
        action: action.to_string(),
        goal: goal.to_string(),
        estimated_savings,
        priority,
        difficulty,
    }
}

fn default_catalog() -> BTreeMap<MetricKind, CatalogEntry> {
    use Priority::{High, Low, Medium};
    BTreeMap::from([
        (
            MetricKind::AlternativeFuelRate,
            entry("Fuel Optimization", "Increase alternative fuel rate", "35% target", 150_000.0, High, Medium),
        ),
        (
            MetricKind::KilnOxygen,
            entry("Combustion Tuning", "Bring kiln inlet O2", "the 2-4% band", 30_000.0, Low, Low),
        ),
        (
            MetricKind::SpecificEnergy,
            entry("Energy Optimization", "Reduce grinding specific energy", "<35 kWh/ton", 80_000.0, High, Medium),
        ),
        (
            MetricKind::LimeSaturationFactor,
            entry("Raw Mix Optimization", "Correct lime saturation factor", "the 92-96 band", 90_000.0, High, Medium),
        ),
        (
            MetricKind::SilicaModulus,
            entry("Raw Mix Optimization", "Adjust silica modulus", "the 2.3-2.7 band", 40_000.0, Medium, Medium),
        ),
        (
            MetricKind::AluminaModulus,
            entry("Raw Mix Optimization", "Adjust alumina modulus", "the 1.3-1.7 band", 40_000.0, Medium, Medium),
        ),
        (
            MetricKind::DefectRate,
            entry("Quality Control", "Reduce defect rate", "<1%", 50_000.0, Medium, Low),
        ),
        (
            MetricKind::CompressiveStrength28d,
            entry("Product Strength", "Raise 28-day strength", ">42.5 MPa", 60_000.0, Medium, Medium),
        ),
        (
            MetricKind::Fineness,
            entry("Grinding Fineness", "Bring Blaine fineness", "3200-3600 cm²/g", 40_000.0, Medium, Low),
        ),
    ])
}

fn default_standing() -> Vec<StandingOpportunity> {
    vec![
        StandingOpportunity {
            category: "Predictive Maintenance".to_string(),
            description: "Implement AI-powered predictive maintenance for kiln and mills".to_string(),
            estimated_savings: 200_000.0,
            priority: Priority::High,
            difficulty: Priority::High,
        },
        StandingOpportunity {
            category: "Process Integration".to_string(),
            description: "Optimize cross-process parameters for holistic efficiency".to_string(),
            estimated_savings: 120_000.0,
            priority: Priority::Medium,
            difficulty: Priority::Medium,
        },
    ]
}

// ============================================================================
// Chat & LLM
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_requests_per_minute: u32,
    pub max_requests_per_hour: u32,
    pub max_message_length: usize,
    pub history_window: usize,
    pub max_tool_rounds: u32,
    pub max_daily_cost_usd: f64,
    pub cost_per_1k_tokens_usd: f64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: defaults::CHAT_MAX_REQUESTS_PER_MINUTE,
            max_requests_per_hour: defaults::CHAT_MAX_REQUESTS_PER_HOUR,
            max_message_length: defaults::CHAT_MAX_MESSAGE_LENGTH,
            history_window: defaults::CHAT_HISTORY_WINDOW,
            max_tool_rounds: defaults::CHAT_MAX_TOOL_ROUNDS,
            max_daily_cost_usd: defaults::CHAT_MAX_DAILY_COST_USD,
            cost_per_1k_tokens_usd: defaults::CHAT_COST_PER_1K_TOKENS_USD,
        }
    }
}

/// Hosted LLM endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Resolved key; never written back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
                .to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
            api_key: None,
            temperature: 0.7,
            request_timeout_secs: defaults::LLM_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty()) && !self.endpoint.is_empty()
    }
}
