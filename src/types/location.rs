//! Plant location reference data

use serde::{Deserialize, Serialize};

use crate::kpi_engine::EngineError;

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Validate ranges: latitude in [-90, 90], longitude in [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, EngineError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(EngineError::InvalidInput(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(EngineError::InvalidInput(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A plant in the location catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantLocation {
    pub code: String,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capacity_tpd: Option<i64>,
    pub plant_type: Option<String>,
    pub status: String,
}

impl PlantLocation {
    /// Coordinates if both are present and in range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon).ok(),
            _ => None,
        }
    }

    pub fn is_operational(&self) -> bool {
        self.status.eq_ignore_ascii_case("operational")
    }
}

/// Optional filters for listing locations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationFilter {
    pub state: Option<String>,
    pub status: Option<String>,
    pub plant_type: Option<String>,
}

impl LocationFilter {
    pub fn matches(&self, plant: &PlantLocation) -> bool {
        let eq = |want: &Option<String>, have: Option<&str>| match want {
            Some(w) => have.is_some_and(|h| h == w),
            None => true,
        };
        eq(&self.state, plant.state.as_deref())
            && eq(&self.status, Some(plant.status.as_str()))
            && eq(&self.plant_type, plant.plant_type.as_deref())
    }
}
