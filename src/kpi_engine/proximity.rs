//! Great-circle distance and nearby-plant search

use serde::Serialize;
use tracing::debug;

use super::EngineError;
use crate::config::defaults::{DEFAULT_NEARBY_RADIUS_KM, EARTH_RADIUS_KM, MAX_NEARBY_RADIUS_KM};
use crate::types::{Coordinates, PlantLocation};

/// Haversine distance between two points on a sphere of mean Earth radius.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Radius accepted from API callers: `0 < r <= 2000` km, default 500.
pub fn search_radius(requested: Option<f64>) -> Result<f64, EngineError> {
    let radius = requested.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
    if radius.is_finite() && radius > 0.0 && radius <= MAX_NEARBY_RADIUS_KM {
        Ok(radius)
    } else {
        Err(EngineError::InvalidInput(format!(
            "radius_km must be in (0, {MAX_NEARBY_RADIUS_KM}], got {radius}"
        )))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyPlant {
    #[serde(flatten)]
    pub plant: PlantLocation,
    pub distance_km: f64,
}

/// Plants within `radius_km` of `reference`, nearest first.
///
/// The reference itself (matched by code) and plants without valid
/// coordinates are skipped. Equal distances are ordered by code.
pub fn find_nearby(
    reference: &PlantLocation,
    all: &[PlantLocation],
    radius_km: f64,
) -> Result<Vec<NearbyPlant>, EngineError> {
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "radius must be a non-negative number of km, got {radius_km}"
        )));
    }
    let origin = reference.coordinates().ok_or_else(|| {
        EngineError::InvalidInput(format!("plant {} has no valid coordinates", reference.code))
    })?;

    let mut nearby: Vec<NearbyPlant> = all
        .iter()
        .filter(|p| p.code != reference.code)
        .filter_map(|p| {
            let coords = p.coordinates()?;
            let distance_km = haversine_km(origin, coords);
            (distance_km <= radius_km).then(|| NearbyPlant {
                plant: p.clone(),
                distance_km,
            })
        })
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.plant.code.cmp(&b.plant.code))
    });
    debug!(
        reference = %reference.code,
        radius_km,
        found = nearby.len(),
        "Nearby plant search"
    );
    Ok(nearby)
}
