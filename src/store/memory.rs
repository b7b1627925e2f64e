//! In-process store
//!
//! Holds fixture aggregates and rows in memory. An empty store answers every
//! query with "no data"; [`MemoryStore::demo`] seeds a small plant network
//! for `--demo` runs and tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    ChatEntry, PlantStore, RecordFilter, RecordQuery, RecordTable, StoreError,
    StoredRecommendation,
};
use crate::types::{LocationFilter, PlantLocation, ProcessAggregate, ProcessType, Window};

#[derive(Default)]
pub struct MemoryStore {
    aggregates: HashMap<ProcessType, ProcessAggregate>,
    /// Oldest first
    records: HashMap<RecordTable, Vec<serde_json::Value>>,
    locations: Vec<PlantLocation>,
    recommendations: Vec<StoredRecommendation>,
    chat: RwLock<Vec<ChatEntry>>,
    /// When set, every call fails as if the database were down
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails with [`StoreError::NotConfigured`].
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Set the aggregate returned for `aggregate.process_type`.
    ///
    /// The returned aggregate takes the requested window's hours.
    pub fn with_aggregate(mut self, aggregate: ProcessAggregate) -> Self {
        self.aggregates.insert(aggregate.process_type, aggregate);
        self
    }

    pub fn with_location(mut self, location: PlantLocation) -> Self {
        self.locations.push(location);
        self
    }

    /// Append a raw row (newest last).
    pub fn with_record(mut self, table: RecordTable, row: serde_json::Value) -> Self {
        self.records.entry(table).or_default().push(row);
        self
    }

    pub fn with_recommendation(mut self, rec: StoredRecommendation) -> Self {
        self.recommendations.push(rec);
        self
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::NotConfigured)
        } else {
            Ok(())
        }
    }

    /// Seeded sample plant: healthy grinding, low alternative fuel, LSF
    /// slightly under band, and a handful of locations.
    pub fn demo() -> Self {
        let window = Window::default();
        let now = Utc::now();

        let mut kiln = ProcessAggregate::empty(ProcessType::Kiln, window);
        kiln.row_count = 288;
        kiln.avg_temperature = Some(1452.0);
        kiln.avg_feed_rate = Some(310.0);
        kiln.avg_fuel_rate = Some(15.0);
        kiln.avg_alt_fuel_rate = Some(5.0);
        kiln.avg_production = Some(180.0);
        kiln.avg_power = Some(4200.0);
        kiln.avg_o2_pct = Some(3.1);

        let mut grinding = ProcessAggregate::empty(ProcessType::Grinding, window);
        grinding.row_count = 288;
        grinding.avg_feed_rate = Some(120.0);
        grinding.avg_power = Some(3960.0);
        grinding.avg_fineness = Some(3400.0);
        grinding.avg_temperature = Some(105.0);

        let mut raw = ProcessAggregate::empty(ProcessType::RawMaterial, window);
        raw.row_count = 96;
        raw.avg_feed_rate = Some(300.0);
        raw.avg_cao = Some(40.5);
        raw.avg_sio2 = Some(13.8);
        raw.avg_al2o3 = Some(3.5);
        raw.avg_fe2o3 = Some(2.3);

        let mut quality = ProcessAggregate::empty(ProcessType::Quality, window);
        quality.row_count = 200;
        quality.avg_strength_28d = Some(48.5);
        quality.avg_fineness = Some(3380.0);
        quality.avg_so3_pct = Some(2.6);
        quality.defect_count = Some(2);
        quality.total_samples = Some(200);

        let mut utilities = ProcessAggregate::empty(ProcessType::Utilities, window);
        utilities.row_count = 288;
        utilities.avg_power = Some(9500.0);
        utilities.avg_production = Some(180.0);

        let mut store = Self::new()
            .with_aggregate(kiln)
            .with_aggregate(grinding)
            .with_aggregate(raw)
            .with_aggregate(quality)
            .with_aggregate(utilities);

        for (i, (fuel_type, tsr)) in [("Biomass", 8.5), ("RDF", 12.0), ("Tyre chips", 4.5)]
            .into_iter()
            .enumerate()
        {
            store = store.with_record(
                RecordTable::AlternativeFuels,
                json!({
                    "id": i + 1,
                    "timestamp": (now - Duration::hours(3 - i as i64)).to_rfc3339(),
                    "fuel_type": fuel_type,
                    "tsr": tsr,
                }),
            );
        }
        for (i, kind) in ["energy", "fuel_mix", "energy_recovery"].into_iter().enumerate() {
            store = store.with_record(
                RecordTable::OptimizationResults,
                json!({
                    "id": i + 1,
                    "timestamp": (now - Duration::hours(3 - i as i64)).to_rfc3339(),
                    "optimization_type": kind,
                    "expected_savings": 25_000.0 * (i as f64 + 1.0),
                }),
            );
        }
        for (i, status) in ["pending", "implemented"].into_iter().enumerate() {
            store = store.with_record(
                RecordTable::AiRecommendations,
                json!({
                    "id": i + 1,
                    "timestamp": (now - Duration::hours(2 - i as i64)).to_rfc3339(),
                    "module": "kiln",
                    "status": status,
                }),
            );
        }

        store = store.with_recommendation(StoredRecommendation {
            module: "kiln".to_string(),
            recommendation_type: Some("fuel".to_string()),
            description: "Raise RDF feed by 1 t/h while holding burning zone above 1430 °C"
                .to_string(),
            priority: Some("High".to_string()),
            estimated_savings: Some(45_000.0),
            confidence_score: Some(0.82),
            status: Some("pending".to_string()),
            timestamp: now - Duration::hours(2),
        });

        for plant in demo_locations() {
            store = store.with_location(plant);
        }
        store
    }
}

fn plant(
    code: &str,
    name: &str,
    city: &str,
    state: &str,
    coords: (f64, f64),
    capacity_tpd: i64,
    plant_type: &str,
) -> PlantLocation {
    PlantLocation {
        code: code.to_string(),
        name: name.to_string(),
        city: Some(city.to_string()),
        state: Some(state.to_string()),
        country: "India".to_string(),
        latitude: Some(coords.0),
        longitude: Some(coords.1),
        capacity_tpd: Some(capacity_tpd),
        plant_type: Some(plant_type.to_string()),
        status: "operational".to_string(),
    }
}

fn demo_locations() -> Vec<PlantLocation> {
    vec![
        plant("JHR", "Jharli Plant", "Jharli", "Haryana", (28.5820, 76.6110), 6_000, "Grinding Unit"),
        plant("NMB", "Nimbahera Plant", "Nimbahera", "Rajasthan", (24.6217, 74.6799), 14_000, "Integrated"),
        plant("GTN", "Gotan Plant", "Gotan", "Rajasthan", (26.6775, 73.6089), 9_000, "Integrated"),
        plant("MGR", "Mangrol Plant", "Mangrol", "Rajasthan", (25.3313, 76.5114), 12_000, "Integrated"),
        plant("BLS", "Balasinor Plant", "Balasinor", "Gujarat", (22.9553, 73.3351), 4_000, "Grinding Unit"),
    ]
}

#[async_trait]
impl PlantStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn fetch_aggregate(
        &self,
        process: ProcessType,
        window: Window,
    ) -> Result<ProcessAggregate, StoreError> {
        self.check_online()?;
        Ok(match self.aggregates.get(&process) {
            Some(agg) => ProcessAggregate {
                window_hours: window.as_hours(),
                ..agg.clone()
            },
            None => ProcessAggregate::empty(process, window),
        })
    }

    async fn recent_records(
        &self,
        table: RecordTable,
        query: &RecordQuery,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        self.check_online()?;
        let Some(rows) = self.records.get(&table) else {
            return Ok(Vec::new());
        };
        let filter = table.filter().zip(query.filter.as_deref());
        Ok(rows
            .iter()
            .rev()
            .filter(|row| match filter {
                Some((RecordFilter::Contains(column), needle)) => row[column]
                    .as_str()
                    .is_some_and(|v| v.to_lowercase().contains(&needle.to_lowercase())),
                Some((RecordFilter::Equals(column), wanted)) => {
                    row[column].as_str() == Some(wanted)
                }
                None => true,
            })
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn list_locations(
        &self,
        filter: &LocationFilter,
    ) -> Result<Vec<PlantLocation>, StoreError> {
        self.check_online()?;
        let mut plants: Vec<PlantLocation> = self
            .locations
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        plants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plants)
    }

    async fn get_location(&self, code: &str) -> Result<Option<PlantLocation>, StoreError> {
        self.check_online()?;
        Ok(self.locations.iter().find(|p| p.code == code).cloned())
    }

    async fn recommendations(
        &self,
        module: Option<&str>,
        limit: u32,
    ) -> Result<Vec<StoredRecommendation>, StoreError> {
        self.check_online()?;
        let mut recs: Vec<StoredRecommendation> = self
            .recommendations
            .iter()
            .filter(|r| module.map_or(true, |m| r.module == m))
            .cloned()
            .collect();
        recs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recs.truncate(limit as usize);
        Ok(recs)
    }

    async fn append_chat(&self, entry: &ChatEntry) -> Result<(), StoreError> {
        self.check_online()?;
        self.chat.write().await.push(entry.clone());
        Ok(())
    }

    async fn chat_history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatEntry>, StoreError> {
        self.check_online()?;
        let chat = self.chat.read().await;
        let session: Vec<&ChatEntry> = chat.iter().filter(|e| e.session_id == session_id).collect();
        let skip = session.len().saturating_sub(limit as usize);
        Ok(session.into_iter().skip(skip).cloned().collect())
    }
}
