//! Agent tool catalogue
//!
//! Each tool is a thin adapter from model-supplied JSON arguments to a store
//! or engine call. Failures come back as `{"error": "..."}` so the model can
//! read them and recover.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::AgentError;
use crate::config::PlantConfig;
use crate::kpi_engine::{
    efficiency_report, find_nearby, find_opportunities, quality_trends, search_radius,
    EngineError,
};
use crate::store::{PlantStore, RecordQuery, RecordTable};
use crate::types::{LocationFilter, ProcessType, Window};

/// Most recommendations a single tool call may return.
const MAX_TOOL_RECOMMENDATIONS: u32 = 100;

/// A callable exposed to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the argument object
    pub parameters: Value,
}

impl ToolSpec {
    /// Chat-completions `tools` entry.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Everything a tool needs to run.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub store: &'a dyn PlantStore,
    pub config: &'a PlantConfig,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    let tables: Vec<&str> = RecordTable::ALL.iter().map(|t| t.table_name()).collect();
    let processes: Vec<&str> = ProcessType::ALL.iter().map(|p| p.as_str()).collect();

    vec![
        ToolSpec {
            name: "get_realtime_plant_data",
            description: "Fetch the most recent raw rows from a plant telemetry table, newest first.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "table_name": { "type": "string", "enum": tables },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 1000, "default": 50 }
                },
                "required": ["table_name"]
            }),
        },
        ToolSpec {
            name: "calculate_efficiency_metrics",
            description: "Derived efficiency metrics for one process over a lookback window, each with target band and status.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "process_type": { "type": "string", "enum": processes },
                    "hours_back": { "type": "integer", "minimum": 1, "default": 24 }
                },
                "required": ["process_type"]
            }),
        },
        ToolSpec {
            name: "get_ai_recommendations",
            description: "Stored optimisation recommendations for a module (kiln, grinding, quality, fuel, ...), newest first.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "module": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": MAX_TOOL_RECOMMENDATIONS, "default": 10 }
                },
                "required": ["module"]
            }),
        },
        ToolSpec {
            name: "analyze_quality_trends",
            description: "Cement quality over the last N days: defect rate, 28-day strength, fineness, SO3 and an overall grade.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "days_back": { "type": "integer", "minimum": 1, "default": 7 }
                }
            }),
        },
        ToolSpec {
            name: "find_optimization_opportunities",
            description: "Plant-wide scan for out-of-band metrics with estimated annual savings, ranked.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: "find_nearby_plants",
            description: "Plants within a radius of the given plant code, nearest first, with great-circle distances in km.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "plant_code": { "type": "string" },
                    "radius_km": { "type": "number", "exclusiveMinimum": 0, "maximum": 2000, "default": 500 }
                },
                "required": ["plant_code"]
            }),
        },
    ]
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Deserialize)]
struct PlantDataArgs {
    table_name: String,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct EfficiencyArgs {
    process_type: String,
    #[serde(default = "default_hours_back")]
    hours_back: i64,
}

#[derive(Deserialize)]
struct RecommendationArgs {
    module: String,
    #[serde(default = "default_recommendation_limit")]
    limit: u32,
}

#[derive(Deserialize)]
struct QualityArgs {
    #[serde(default = "default_days_back")]
    days_back: i64,
}

#[derive(Deserialize)]
struct NearbyArgs {
    plant_code: String,
    #[serde(default)]
    radius_km: Option<f64>,
}

fn default_hours_back() -> i64 {
    24
}

fn default_recommendation_limit() -> u32 {
    10
}

fn default_days_back() -> i64 {
    7
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, AgentError> {
    // Argument-less calls sometimes arrive as null
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|e| AgentError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run a tool by name. Never fails; errors become `{"error": ...}`.
pub async fn dispatch(ctx: ToolContext<'_>, name: &str, args: &Value) -> Value {
    match run_tool(ctx, name, args).await {
        Ok(value) => {
            debug!(tool = name, "Tool call succeeded");
            value
        }
        Err(e) => {
            warn!(tool = name, error = %e, "Tool call failed");
            json!({ "error": e.to_string() })
        }
    }
}

async fn run_tool(ctx: ToolContext<'_>, name: &str, args: &Value) -> Result<Value, AgentError> {
    let max_hours = ctx.config.formulas.max_window_hours;

    match name {
        "get_realtime_plant_data" => {
            let a: PlantDataArgs = parse_args(name, args)?;
            let table: RecordTable = a.table_name.parse()?;
            let query = RecordQuery::new(a.limit, None)?;
            let rows = ctx.store.recent_records(table, &query).await?;
            Ok(json!({
                "table": table.table_name(),
                "records_count": rows.len(),
                "data": rows,
                "timestamp": Utc::now().to_rfc3339(),
            }))
        }
        "calculate_efficiency_metrics" => {
            let a: EfficiencyArgs = parse_args(name, args)?;
            let process: ProcessType = a.process_type.parse()?;
            let window = Window::hours_clamped(a.hours_back, max_hours)?;
            let report = efficiency_report(ctx.store, ctx.config, process, window).await;
            Ok(serde_json::to_value(report)?)
        }
        "get_ai_recommendations" => {
            let a: RecommendationArgs = parse_args(name, args)?;
            let limit = a.limit.clamp(1, MAX_TOOL_RECOMMENDATIONS);
            let recs = ctx.store.recommendations(Some(a.module.as_str()), limit).await?;
            Ok(json!({
                "module": a.module,
                "count": recs.len(),
                "recommendations": recs,
            }))
        }
        "analyze_quality_trends" => {
            let a: QualityArgs = parse_args(name, args)?;
            let window = Window::days(a.days_back, max_hours)?;
            Ok(serde_json::to_value(quality_trends(ctx.store, ctx.config, window).await)?)
        }
        "find_optimization_opportunities" => {
            Ok(serde_json::to_value(find_opportunities(ctx.store, ctx.config).await?)?)
        }
        "find_nearby_plants" => {
            let a: NearbyArgs = parse_args(name, args)?;
            let radius = search_radius(a.radius_km)?;
            let reference = ctx
                .store
                .get_location(&a.plant_code)
                .await?
                .ok_or_else(|| {
                    EngineError::InvalidInput(format!("unknown plant code '{}'", a.plant_code))
                })?;
            let all = ctx.store.list_locations(&LocationFilter::default()).await?;
            let nearby = find_nearby(&reference, &all, radius)?;
            Ok(json!({
                "reference": reference.code,
                "radius_km": radius,
                "count": nearby.len(),
                "plants": nearby,
            }))
        }
        other => Err(AgentError::UnknownTool(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    fn ctx<'a>(store: &'a MemoryStore, config: &'a PlantConfig) -> ToolContext<'a> {
        ToolContext { store, config }
    }

    #[test]
    fn catalogue_names_unique_and_schemas_are_objects() {
        let specs = tool_specs();
        assert_eq!(specs.len(), 6);
        let names: HashSet<_> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), specs.len());
        for spec in &specs {
            assert_eq!(spec.parameters["type"], "object");
            assert_eq!(spec.to_wire()["function"]["name"], spec.name);
        }
    }

    #[tokio::test]
    async fn efficiency_tool_returns_report() {
        let store = MemoryStore::demo();
        let config = PlantConfig::default();
        let out = dispatch(
            ctx(&store, &config),
            "calculate_efficiency_metrics",
            &json!({ "process_type": "kiln" }),
        )
        .await;
        assert_eq!(out["process"], "kiln");
        assert_eq!(out["metrics"]["alternative_fuel_rate_pct"]["value"], 25.0);
        assert_eq!(out["metrics"]["alternative_fuel_rate_pct"]["status"], "needs-attention");
    }

    #[tokio::test]
    async fn bad_arguments_become_error_values() {
        let store = MemoryStore::demo();
        let config = PlantConfig::default();
        let c = ctx(&store, &config);

        let out = dispatch(c, "calculate_efficiency_metrics", &json!({ "process_type": "furnace" })).await;
        assert!(out["error"].as_str().unwrap().contains("unknown process type"));

        let out = dispatch(c, "get_realtime_plant_data", &json!({})).await;
        assert!(out["error"].as_str().unwrap().contains("table_name"));

        let out = dispatch(c, "launch_rockets", &Value::Null).await;
        assert_eq!(out["error"], "Unknown tool 'launch_rockets'");
    }

    #[tokio::test]
    async fn store_failure_is_reported_not_raised() {
        let store = MemoryStore::offline();
        let config = PlantConfig::default();
        let out = dispatch(
            ctx(&store, &config),
            "get_realtime_plant_data",
            &json!({ "table_name": "kiln_operations" }),
        )
        .await;
        assert!(out.get("error").is_some());
    }

    #[tokio::test]
    async fn nearby_tool_uses_catalogue() {
        let store = MemoryStore::demo();
        let config = PlantConfig::default();
        let out = dispatch(
            ctx(&store, &config),
            "find_nearby_plants",
            &json!({ "plant_code": "NMB", "radius_km": 300 }),
        )
        .await;
        assert_eq!(out["count"], 3);
        assert_eq!(out["plants"][0]["code"], "MGR");

        let out = dispatch(
            ctx(&store, &config),
            "find_nearby_plants",
            &json!({ "plant_code": "NMB", "radius_km": 5000 }),
        )
        .await;
        assert!(out.get("error").is_some());
    }

    #[tokio::test]
    async fn argument_less_tools_accept_null() {
        let store = MemoryStore::demo();
        let config = PlantConfig::default();
        let out = dispatch(ctx(&store, &config), "find_optimization_opportunities", &Value::Null).await;
        assert!(out["opportunities"].as_array().is_some_and(|o| !o.is_empty()));

        let out = dispatch(ctx(&store, &config), "analyze_quality_trends", &Value::Null).await;
        assert_eq!(out["days"], 7);
        assert_eq!(out["quality_status"], "Excellent");
    }
}
