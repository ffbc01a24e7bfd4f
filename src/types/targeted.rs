//! Targeted analysis output: per-hypothesis verdicts plus cross-cutting notes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportVerdict {
    Supported,
    PartiallySupported,
    Refuted,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub statement: String,
    pub evidence: Vec<String>,
    /// 0.0-1.0
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredMetric {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
}

/// Analysis of a single hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisAnalysis {
    pub hypothesis_id: String,
    pub findings: Vec<Finding>,
    pub metrics: Vec<MeasuredMetric>,
    pub verdict: SupportVerdict,
    pub support_strength: SupportStrength,
    pub alternative_explanations: Vec<String>,
    pub insights: Vec<String>,
    pub limitations: Vec<String>,
    pub recommended_actions: Vec<String>,
    /// 0.0-1.0
    pub confidence: f64,
}

/// Targeted analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetedAnalysis {
    pub results: Vec<HypothesisAnalysis>,
    pub cross_hypothesis_insights: Vec<String>,
    pub methodology_notes: Vec<String>,
    pub data_quality_caveats: Vec<String>,
    pub priority_findings: Vec<String>,
    /// 0.0-1.0
    pub confidence_score: f64,
}

impl TargetedAnalysis {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            cross_hypothesis_insights: Vec::new(),
            methodology_notes: Vec::new(),
            data_quality_caveats: Vec::new(),
            priority_findings: Vec::new(),
            confidence_score: 0.0,
        }
    }

    pub fn result_for(&self, hypothesis_id: &str) -> Option<&HypothesisAnalysis> {
        self.results.iter().find(|r| r.hypothesis_id == hypothesis_id)
    }
}
