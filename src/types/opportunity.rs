//! Optimization opportunity records

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{MetricKind, MetricStatus};

/// Opportunity priority, lowest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

/// Implementation difficulty uses the same three-level scale.
pub type Difficulty = Priority;

/// A detected improvement opportunity with a fixed savings estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub category: String,
    pub description: String,
    pub estimated_savings: f64,
    pub currency: String,
    pub priority: Priority,
    pub implementation_difficulty: Difficulty,
    /// Metric that triggered the opportunity; `None` for standing items
    pub source_metric: Option<MetricKind>,
    pub source_status: Option<MetricStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_serializes_capitalized() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"High\"");
        let p: Priority = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(p, Priority::Medium);
    }
}
