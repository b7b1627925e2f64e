//! PostgreSQL-backed store
//!
//! Every query runs under the configured timeout and binds its window,
//! limit and filter values. Table names are taken from [`RecordTable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    ChatEntry, ChatRole, PlantStore, RecordFilter, RecordQuery, RecordTable, StoreError,
    StoredRecommendation,
};
use crate::types::{LocationFilter, PlantLocation, ProcessAggregate, ProcessType, Window};

/// Averaged columns in the order every aggregate query returns them.
const AGGREGATE_COLUMNS: [&str; 14] = [
    "avg_temperature",
    "avg_feed_rate",
    "avg_fuel_rate",
    "avg_alt_fuel_rate",
    "avg_production",
    "avg_power",
    "avg_fineness",
    "avg_strength_28d",
    "avg_o2_pct",
    "avg_so3_pct",
    "avg_cao",
    "avg_sio2",
    "avg_al2o3",
    "avg_fe2o3",
];

/// Source column for each aggregate a process table provides.
fn source_columns(process: ProcessType) -> &'static [(&'static str, &'static str)] {
    match process {
        ProcessType::Kiln => &[
            ("avg_temperature", "burning_zone_temp"),
            ("avg_feed_rate", "kiln_feed_rate"),
            ("avg_fuel_rate", "coal_feed_rate"),
            ("avg_alt_fuel_rate", "alternative_fuel_rate"),
            ("avg_production", "clinker_production"),
            ("avg_power", "power_consumption"),
            ("avg_o2_pct", "o2_pct"),
        ],
        ProcessType::Grinding => &[
            ("avg_temperature", "temperature"),
            ("avg_feed_rate", "feed_rate"),
            ("avg_power", "power_consumption"),
            ("avg_fineness", "product_fineness"),
        ],
        ProcessType::RawMaterial => &[
            ("avg_feed_rate", "feed_rate"),
            ("avg_cao", "cao"),
            ("avg_sio2", "sio2"),
            ("avg_al2o3", "al2o3"),
            ("avg_fe2o3", "fe2o3"),
        ],
        ProcessType::Quality => &[
            ("avg_fineness", "fineness"),
            ("avg_strength_28d", "compressive_strength_28d"),
            ("avg_so3_pct", "so3"),
        ],
        ProcessType::Utilities => &[
            ("avg_power", "power_consumption"),
            ("avg_production", "production_tph"),
        ],
    }
}

/// One SELECT per process; the window is bound as `$1` hours.
fn aggregate_sql(process: ProcessType) -> String {
    let sources = source_columns(process);
    let mut select = vec!["COUNT(*)::int8 AS row_count".to_string()];

    for alias in AGGREGATE_COLUMNS {
        match sources.iter().find(|(a, _)| *a == alias) {
            Some((_, column)) => select.push(format!("AVG({column})::float8 AS {alias}")),
            None => select.push(format!("NULL::float8 AS {alias}")),
        }
    }

    if process == ProcessType::Quality {
        select.push(
            "COUNT(*) FILTER (WHERE status IS NOT NULL AND lower(status) <> 'pass')::int8 AS defect_count"
                .to_string(),
        );
        select.push("COUNT(status)::int8 AS total_samples".to_string());
    } else {
        select.push("NULL::int8 AS defect_count".to_string());
        select.push("NULL::int8 AS total_samples".to_string());
    }

    format!(
        "SELECT {} FROM {} WHERE timestamp >= NOW() - make_interval(hours => $1)",
        select.join(", "),
        RecordTable::for_process(process).table_name()
    )
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

type LocationRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<f64>,
    Option<f64>,
    Option<i64>,
    Option<String>,
    String,
);

const LOCATION_COLUMNS: &str =
    "code, name, city, state, country, latitude, longitude, capacity_tpd, plant_type, status";

fn location_from_row(row: LocationRow) -> PlantLocation {
    let (code, name, city, state, country, latitude, longitude, capacity_tpd, plant_type, status) =
        row;
    PlantLocation {
        code,
        name,
        city,
        state,
        country,
        latitude,
        longitude,
        capacity_tpd,
        plant_type,
        status,
    }
}

/// sqlx/PostgreSQL implementation of [`PlantStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                warn!(op, timeout_secs = self.query_timeout.as_secs(), "Query timed out");
                Err(StoreError::Timeout(op, self.query_timeout.as_secs()))
            }
        }
    }
}

#[async_trait]
impl PlantStore for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.timed("ping", sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }

    async fn fetch_aggregate(
        &self,
        process: ProcessType,
        window: Window,
    ) -> Result<ProcessAggregate, StoreError> {
        let sql = aggregate_sql(process);
        let row = self
            .timed(
                "fetch_aggregate",
                sqlx::query(&sql)
                    .bind(window.as_sql_hours())
                    .fetch_one(&self.pool),
            )
            .await?;

        let row_count: i64 = row.try_get("row_count")?;
        debug!(process = %process, window = %window, row_count, "Fetched aggregate");
        if row_count <= 0 {
            return Ok(ProcessAggregate::empty(process, window));
        }

        let avg = |name: &str| -> Result<Option<f64>, sqlx::Error> { row.try_get(name) };
        let count = |name: &str| -> Result<Option<u64>, sqlx::Error> {
            let v: Option<i64> = row.try_get(name)?;
            Ok(v.and_then(|n| u64::try_from(n).ok()))
        };

        Ok(ProcessAggregate {
            process_type: process,
            window_hours: window.as_hours(),
            row_count: u64::try_from(row_count).unwrap_or(0),
            avg_temperature: avg("avg_temperature")?,
            avg_feed_rate: avg("avg_feed_rate")?,
            avg_fuel_rate: avg("avg_fuel_rate")?,
            avg_alt_fuel_rate: avg("avg_alt_fuel_rate")?,
            avg_production: avg("avg_production")?,
            avg_power: avg("avg_power")?,
            avg_fineness: avg("avg_fineness")?,
            avg_strength_28d: avg("avg_strength_28d")?,
            avg_o2_pct: avg("avg_o2_pct")?,
            avg_so3_pct: avg("avg_so3_pct")?,
            avg_cao: avg("avg_cao")?,
            avg_sio2: avg("avg_sio2")?,
            avg_al2o3: avg("avg_al2o3")?,
            avg_fe2o3: avg("avg_fe2o3")?,
            defect_count: count("defect_count")?,
            total_samples: count("total_samples")?,
        })
    }

    async fn recent_records(
        &self,
        table: RecordTable,
        query: &RecordQuery,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let filter = table.filter().zip(query.filter.as_deref());
        let where_clause = match filter {
            Some((RecordFilter::Contains(column), _)) => format!("WHERE {column} ILIKE $2"),
            Some((RecordFilter::Equals(column), _)) => format!("WHERE {column} = $2"),
            None => String::new(),
        };
        let sql = format!(
            "SELECT row_to_json(t)::jsonb FROM (SELECT * FROM {} {} ORDER BY timestamp DESC LIMIT $1) t",
            table.table_name(),
            where_clause
        );

        let mut q = sqlx::query_scalar::<_, serde_json::Value>(&sql).bind(i64::from(query.limit));
        q = match filter {
            Some((RecordFilter::Contains(_), value)) => q.bind(format!("%{}%", escape_like(value))),
            Some((RecordFilter::Equals(_), value)) => q.bind(value.to_string()),
            None => q,
        };

        self.timed("recent_records", q.fetch_all(&self.pool)).await
    }

    async fn list_locations(
        &self,
        filter: &LocationFilter,
    ) -> Result<Vec<PlantLocation>, StoreError> {
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM plant_locations \
             WHERE ($1::text IS NULL OR state = $1) \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::text IS NULL OR plant_type = $3) \
             ORDER BY name"
        );
        let rows: Vec<LocationRow> = self
            .timed(
                "list_locations",
                sqlx::query_as(&sql)
                    .bind(filter.state.as_deref())
                    .bind(filter.status.as_deref())
                    .bind(filter.plant_type.as_deref())
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(location_from_row).collect())
    }

    async fn get_location(&self, code: &str) -> Result<Option<PlantLocation>, StoreError> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM plant_locations WHERE code = $1");
        let row: Option<LocationRow> = self
            .timed(
                "get_location",
                sqlx::query_as(&sql).bind(code).fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(location_from_row))
    }

    async fn recommendations(
        &self,
        module: Option<&str>,
        limit: u32,
    ) -> Result<Vec<StoredRecommendation>, StoreError> {
        let rows: Vec<(
            String,
            Option<String>,
            String,
            Option<String>,
            Option<f64>,
            Option<f64>,
            Option<String>,
            DateTime<Utc>,
        )> = self
            .timed(
                "recommendations",
                sqlx::query_as(
                    "SELECT module, recommendation_type, description, priority, estimated_savings, \
                            confidence_score, status, timestamp \
                     FROM ai_recommendations \
                     WHERE ($1::text IS NULL OR module = $1) \
                     ORDER BY timestamp DESC \
                     LIMIT $2",
                )
                .bind(module)
                .bind(i64::from(limit))
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    module,
                    recommendation_type,
                    description,
                    priority,
                    estimated_savings,
                    confidence_score,
                    status,
                    timestamp,
                )| StoredRecommendation {
                    module,
                    recommendation_type,
                    description,
                    priority,
                    estimated_savings,
                    confidence_score,
                    status,
                    timestamp,
                },
            )
            .collect())
    }

    async fn append_chat(&self, entry: &ChatEntry) -> Result<(), StoreError> {
        self.timed(
            "append_chat",
            sqlx::query(
                "INSERT INTO chat_history (session_id, timestamp, role, content, tool_calls) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&entry.session_id)
            .bind(entry.timestamp)
            .bind(entry.role.as_str())
            .bind(&entry.content)
            .bind(Json(&entry.tools_used))
            .execute(&self.pool),
        )
        .await
        .map(|_| ())
    }

    async fn chat_history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatEntry>, StoreError> {
        let rows: Vec<(String, String, Json<Vec<String>>, DateTime<Utc>)> = self
            .timed(
                "chat_history",
                sqlx::query_as(
                    "SELECT role, content, tool_calls, timestamp FROM ( \
                         SELECT id, role, content, tool_calls, timestamp FROM chat_history \
                         WHERE session_id = $1 \
                         ORDER BY timestamp DESC, id DESC \
                         LIMIT $2 \
                     ) recent ORDER BY timestamp ASC, id ASC",
                )
                .bind(session_id)
                .bind(i64::from(limit))
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(role, content, Json(tools_used), timestamp)| {
                let Some(role) = ChatRole::parse(&role) else {
                    warn!(session_id, role = %role, "Skipping chat row with unknown role");
                    return None;
                };
                Some(ChatEntry {
                    session_id: session_id.to_string(),
                    role,
                    content,
                    tools_used,
                    timestamp,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_sql_binds_window() {
        for process in ProcessType::ALL {
            let sql = aggregate_sql(process);
            assert!(sql.contains("make_interval(hours => $1)"), "{sql}");
            assert!(!sql.contains("INTERVAL '"), "window must not be interpolated: {sql}");
        }
    }

    #[test]
    fn aggregate_sql_has_stable_column_set() {
        let sql = aggregate_sql(ProcessType::Grinding);
        for alias in AGGREGATE_COLUMNS {
            assert!(sql.contains(&format!("AS {alias}")), "missing {alias}");
        }
        assert!(sql.contains("AVG(power_consumption)::float8 AS avg_power"));
        assert!(sql.contains("NULL::float8 AS avg_cao"));
        assert!(sql.contains("FROM grinding_operations"));
    }

    #[test]
    fn quality_sql_counts_defects() {
        let sql = aggregate_sql(ProcessType::Quality);
        assert!(sql.contains("lower(status) <> 'pass'"));
        assert!(sql.contains("COUNT(status)::int8 AS total_samples"));
        assert!(aggregate_sql(ProcessType::Kiln).contains("NULL::int8 AS defect_count"));
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("fuel_mix 100%"), "fuel\\_mix 100\\%");
        assert_eq!(escape_like("kiln"), "kiln");
    }
}
