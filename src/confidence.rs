//! Confidence gate for per-entity re-runs
//!
//! Tiers: Low < 0.6 <= Medium < 0.8 <= High

use serde::Serialize;
use std::fmt;

/// Results scored below this are eligible for a re-run
pub const RERUN_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Lower bound of the high tier
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// True when a result is not trustworthy enough to keep.
///
/// NaN counts as below threshold.
pub fn should_rerun(confidence: f64) -> bool {
    confidence.is_nan() || confidence < RERUN_CONFIDENCE_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_score(confidence: f64) -> Self {
        if should_rerun(confidence) {
            ConfidenceTier::Low
        } else if confidence < HIGH_CONFIDENCE_THRESHOLD {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        assert!(should_rerun(0.59));
        assert!(!should_rerun(0.60));
        assert!(!should_rerun(0.95));
        assert!(should_rerun(0.0));
    }

    #[test]
    fn test_nan_reruns() {
        assert!(should_rerun(f64::NAN));
        assert_eq!(ConfidenceTier::from_score(f64::NAN), ConfidenceTier::Low);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(ConfidenceTier::from_score(0.3), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_score(0.6), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.79), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.8), ConfidenceTier::High);
    }
}
