//! Domain types shared by the store, the KPI engine and the HTTP layer.

mod location;
mod metrics;
mod opportunity;
mod process;

pub use location::{Coordinates, LocationFilter, PlantLocation};
pub use metrics::{format_number, round2, MetricKind, MetricReading, MetricStatus, TargetBand};
pub use opportunity::{Difficulty, Opportunity, Priority};
pub use process::{ProcessAggregate, ProcessType, Window};
