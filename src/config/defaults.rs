//! System-wide default constants.
//!
//! Centralises magic numbers used as config defaults and hard limits.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Windows & Formulas
// ============================================================================

/// Upper bound on any lookback window (hours). 8 760 = one year.
pub const MAX_WINDOW_HOURS: u32 = 8_760;

/// Default lookback for efficiency metrics and opportunities (hours).
pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;

/// Default lookback for quality trend analysis (hours). 168 = 7 days.
pub const DEFAULT_QUALITY_LOOKBACK_HOURS: u32 = 168;

/// Plant-specific kcal/kg-based conversion factor for kiln thermal efficiency.
pub const THERMAL_CONVERSION_FACTOR: f64 = 1.6;

/// Specific energy (kWh/t) at which the grinding efficiency score reaches zero.
pub const EFFICIENCY_SCORE_REFERENCE_KWH_T: f64 = 50.0;

/// Score points lost per kWh/t of specific energy.
pub const EFFICIENCY_SCORE_SLOPE: f64 = 2.0;

/// Nominal clinker output used for the production-efficiency KPI (t/h).
pub const PRODUCTION_TARGET_TPH: f64 = 100.0;

// ============================================================================
// Earth & Geography
// ============================================================================

/// Mean Earth radius for Haversine distances (km).
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Default search radius for nearby plants (km).
pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 500.0;

/// Largest radius accepted by the nearby-plants endpoint (km).
pub const MAX_NEARBY_RADIUS_KM: f64 = 2_000.0;

/// Map centre returned with plant markers (Ahmedabad).
pub const MAP_CENTER_LATITUDE: f64 = 23.0225;
pub const MAP_CENTER_LONGITUDE: f64 = 72.5714;

// ============================================================================
// Data Store
// ============================================================================

/// Per-query timeout against the data store (seconds).
pub const QUERY_TIMEOUT_SECS: u64 = 5;

/// Pool acquire timeout (seconds).
pub const POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Pool size.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default / maximum row limit for telemetry listings.
pub const DEFAULT_RECORD_LIMIT: u32 = 50;
pub const MAX_RECORD_LIMIT: u32 = 1_000;

// ============================================================================
// Chat
// ============================================================================

pub const CHAT_MAX_REQUESTS_PER_MINUTE: u32 = 20;
pub const CHAT_MAX_REQUESTS_PER_HOUR: u32 = 200;
pub const CHAT_MAX_MESSAGE_LENGTH: usize = 2_000;

/// Most recent history turns forwarded to the LLM.
pub const CHAT_HISTORY_WINDOW: usize = 10;

/// Tool-call round trips allowed before the agent must answer.
pub const CHAT_MAX_TOOL_ROUNDS: u32 = 5;

/// Daily spend ceiling per client (USD).
pub const CHAT_MAX_DAILY_COST_USD: f64 = 5.0;

/// Estimated LLM price per 1 000 tokens (USD).
pub const CHAT_COST_PER_1K_TOKENS_USD: f64 = 0.0001;

/// Hosted LLM request timeout (seconds).
pub const LLM_REQUEST_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// HTTP
// ============================================================================

/// Whole-request timeout applied by the router (seconds).
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
