//! Plant location catalogue and proximity search
//!
//! List endpoints degrade to empty results when the store is down; single
//! plant lookups (and nearby search, which needs one) return 503.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use super::AppState;
use crate::api::envelope::{
    engine_error_response, query_rejection, store_error_response, ApiErrorResponse, ApiResponse,
};
use crate::config::defaults::{MAP_CENTER_LATITUDE, MAP_CENTER_LONGITUDE};
use crate::kpi_engine::{find_nearby, search_radius, NearbyPlant};
use crate::types::{Coordinates, LocationFilter, PlantLocation};

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub reference_plant: PlantLocation,
    pub nearby_plants: Vec<NearbyPlant>,
    pub search_radius_km: f64,
    pub count: usize,
}

/// Catalogue-wide summary.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct LocationStats {
    pub total_plants: usize,
    pub operational_plants: usize,
    pub total_capacity_tpd: i64,
    pub states_covered: usize,
    pub plants_by_state: BTreeMap<String, usize>,
    pub plants_by_type: BTreeMap<String, usize>,
}

impl LocationStats {
    pub fn from_plants(plants: &[PlantLocation]) -> Self {
        let mut stats = Self {
            total_plants: plants.len(),
            ..Self::default()
        };
        let mut states = BTreeSet::new();

        for plant in plants {
            if plant.is_operational() {
                stats.operational_plants += 1;
            }
            stats.total_capacity_tpd += plant.capacity_tpd.unwrap_or(0);
            if let Some(state) = &plant.state {
                states.insert(state.clone());
                *stats.plants_by_state.entry(state.clone()).or_default() += 1;
            }
            if let Some(kind) = &plant.plant_type {
                *stats.plants_by_type.entry(kind.clone()).or_default() += 1;
            }
        }
        stats.states_covered = states.len();
        stats
    }
}

#[derive(Debug, Serialize)]
pub struct StatePlants {
    pub state: String,
    pub count: usize,
    pub total_capacity_tpd: i64,
    pub plants: Vec<PlantLocation>,
}

#[derive(Debug, Serialize)]
pub struct MapMarker {
    pub code: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub state: Option<String>,
    pub capacity_tpd: Option<i64>,
    pub plant_type: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct MapMarkers {
    pub markers: Vec<MapMarker>,
    pub count: usize,
    pub center: Coordinates,
}

/// Plants with usable coordinates become markers; the rest are skipped.
pub fn map_markers(plants: Vec<PlantLocation>) -> MapMarkers {
    let markers: Vec<MapMarker> = plants
        .into_iter()
        .filter_map(|p| {
            let at = p.coordinates()?;
            Some(MapMarker {
                code: p.code,
                name: p.name,
                latitude: at.latitude,
                longitude: at.longitude,
                city: p.city,
                state: p.state,
                capacity_tpd: p.capacity_tpd,
                plant_type: p.plant_type,
                status: p.status,
            })
        })
        .collect();

    MapMarkers {
        count: markers.len(),
        markers,
        center: Coordinates {
            latitude: MAP_CENTER_LATITUDE,
            longitude: MAP_CENTER_LONGITUDE,
        },
    }
}

async fn list_or_empty(state: &AppState, filter: &LocationFilter) -> Vec<PlantLocation> {
    match state.store.list_locations(filter).await {
        Ok(plants) => plants,
        Err(e) => {
            warn!(error = %e, "Location listing failed; returning empty list");
            Vec::new()
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/locations?state=&status=&plant_type=
pub async fn list_locations(
    State(state): State<AppState>,
    filter: Result<Query<LocationFilter>, QueryRejection>,
) -> Response {
    let Query(filter) = match filter {
        Ok(f) => f,
        Err(r) => return query_rejection(r),
    };
    ApiResponse::ok(list_or_empty(&state, &filter).await)
}

/// GET /api/locations/:code
pub async fn get_location(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.store.get_location(&code).await {
        Ok(Some(plant)) => ApiResponse::ok(plant),
        Ok(None) => ApiErrorResponse::not_found(format!("Plant with code {code} not found")),
        Err(e) => store_error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NearbyQuery {
    pub radius_km: Option<f64>,
}

/// GET /api/locations/nearby/:code?radius_km=
pub async fn nearby_locations(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: Result<Query<NearbyQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(r),
    };
    let radius = match search_radius(query.radius_km) {
        Ok(r) => r,
        Err(e) => return engine_error_response(e),
    };

    let reference = match state.store.get_location(&code).await {
        Ok(Some(plant)) => plant,
        Ok(None) => return ApiErrorResponse::not_found(format!("Plant with code {code} not found")),
        Err(e) => return store_error_response(e),
    };
    let all = match state.store.list_locations(&LocationFilter::default()).await {
        Ok(plants) => plants,
        Err(e) => return store_error_response(e),
    };

    match find_nearby(&reference, &all, radius) {
        Ok(nearby) => ApiResponse::ok(NearbyResponse {
            count: nearby.len(),
            nearby_plants: nearby,
            reference_plant: reference,
            search_radius_km: radius,
        }),
        Err(e) => engine_error_response(e),
    }
}

/// GET /api/locations/stats/summary
pub async fn location_stats(State(state): State<AppState>) -> Response {
    let plants = list_or_empty(&state, &LocationFilter::default()).await;
    ApiResponse::ok(LocationStats::from_plants(&plants))
}

/// GET /api/locations/state/:state
pub async fn locations_by_state(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Response {
    let filter = LocationFilter {
        state: Some(region.clone()),
        ..LocationFilter::default()
    };
    let plants = list_or_empty(&state, &filter).await;

    ApiResponse::ok(StatePlants {
        state: region,
        count: plants.len(),
        total_capacity_tpd: plants.iter().filter_map(|p| p.capacity_tpd).sum(),
        plants,
    })
}

/// GET /api/locations/map/markers
pub async fn location_markers(State(state): State<AppState>) -> Response {
    let plants = list_or_empty(&state, &LocationFilter::default()).await;
    ApiResponse::ok(map_markers(plants))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant(code: &str, state: &str, kind: &str, status: &str, cap: Option<i64>) -> PlantLocation {
        PlantLocation {
            code: code.into(),
            name: format!("{code} Works"),
            city: None,
            state: Some(state.into()),
            country: "India".into(),
            latitude: Some(22.0),
            longitude: Some(73.0),
            capacity_tpd: cap,
            plant_type: Some(kind.into()),
            status: status.into(),
        }
    }

    #[test]
    fn stats_count_states_types_and_capacity() {
        let plants = vec![
            plant("A", "Gujarat", "Integrated", "Operational", Some(5000)),
            plant("B", "Gujarat", "Grinding Unit", "Operational", Some(2000)),
            plant("C", "Rajasthan", "Integrated", "Under Maintenance", None),
        ];
        let stats = LocationStats::from_plants(&plants);
        assert_eq!(stats.total_plants, 3);
        assert_eq!(stats.operational_plants, 2);
        assert_eq!(stats.total_capacity_tpd, 7000);
        assert_eq!(stats.states_covered, 2);
        assert_eq!(stats.plants_by_state["Gujarat"], 2);
        assert_eq!(stats.plants_by_type["Integrated"], 2);
    }

    #[test]
    fn empty_catalogue_gives_zero_stats() {
        assert_eq!(LocationStats::from_plants(&[]), LocationStats::default());
    }

    #[test]
    fn markers_skip_plants_without_coordinates() {
        let mut lost = plant("X", "Gujarat", "Integrated", "Operational", None);
        lost.latitude = None;
        let markers = map_markers(vec![
            plant("A", "Gujarat", "Integrated", "Operational", Some(10)),
            lost,
        ]);
        assert_eq!(markers.count, 1);
        assert_eq!(markers.markers[0].code, "A");
        assert_eq!(markers.center.latitude, 23.0225);
        assert_eq!(markers.center.longitude, 72.5714);
    }
}
