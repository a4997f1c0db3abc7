use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative bucket for a metric value compared against a two-point threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
        };
        write!(f, "{}", name)
    }
}

/// Two cut points classifying a metric value into a rating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Values at or below this are good
    pub good: f64,
    /// Values at or below this (but above good) need improvement; above is poor
    pub poor: f64,
}

impl Threshold {
    /// Create a new threshold pair
    pub fn new(good: f64, poor: f64) -> Self {
        Self { good, poor }
    }

    /// Classify a value against the cut points
    pub fn rate(&self, value: f64) -> Rating {
        if value <= self.good {
            Rating::Good
        } else if value <= self.poor {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        }
    }
}
