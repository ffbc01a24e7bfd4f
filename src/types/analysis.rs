//! AnalysisKind and the AnalysisResult sum type stored in the result cache

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AgentForecast, DiscoveryResult, HypothesisSet, TargetedAnalysis};

/// Kind of analysis; doubles as the cache namespace and the inference phase name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Discovery,
    Hypothesis,
    TargetedAnalysis,
    AgentForecast,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Discovery,
        AnalysisKind::Hypothesis,
        AnalysisKind::TargetedAnalysis,
        AnalysisKind::AgentForecast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Discovery => "discovery",
            AnalysisKind::Hypothesis => "hypothesis",
            AnalysisKind::TargetedAnalysis => "targeted_analysis",
            AnalysisKind::AgentForecast => "agent_forecast",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown analysis kind '{s}'"))
    }
}

/// Phase-specific payload, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum AnalysisResult {
    Discovery(DiscoveryResult),
    Hypothesis(HypothesisSet),
    TargetedAnalysis(TargetedAnalysis),
    AgentForecast(AgentForecast),
}

impl AnalysisResult {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisResult::Discovery(_) => AnalysisKind::Discovery,
            AnalysisResult::Hypothesis(_) => AnalysisKind::Hypothesis,
            AnalysisResult::TargetedAnalysis(_) => AnalysisKind::TargetedAnalysis,
            AnalysisResult::AgentForecast(_) => AnalysisKind::AgentForecast,
        }
    }

    pub fn confidence_score(&self) -> f64 {
        match self {
            AnalysisResult::Discovery(r) => r.confidence_score,
            AnalysisResult::Hypothesis(r) => r.confidence_score,
            AnalysisResult::TargetedAnalysis(r) => r.confidence_score,
            AnalysisResult::AgentForecast(r) => r.confidence_score,
        }
    }
}

/// A concrete payload that can travel through the cache as an [`AnalysisResult`].
pub trait AnalysisPayload: Clone + Sized {
    const KIND: AnalysisKind;

    fn into_result(self) -> AnalysisResult;

    /// `None` when the result holds a different kind
    fn from_result(result: AnalysisResult) -> Option<Self>;

    fn confidence_score(&self) -> f64;
}

impl AnalysisPayload for DiscoveryResult {
    const KIND: AnalysisKind = AnalysisKind::Discovery;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::Discovery(self)
    }

    fn from_result(result: AnalysisResult) -> Option<Self> {
        match result {
            AnalysisResult::Discovery(r) => Some(r),
            _ => None,
        }
    }

    fn confidence_score(&self) -> f64 {
        self.confidence_score
    }
}

impl AnalysisPayload for HypothesisSet {
    const KIND: AnalysisKind = AnalysisKind::Hypothesis;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::Hypothesis(self)
    }

    fn from_result(result: AnalysisResult) -> Option<Self> {
        match result {
            AnalysisResult::Hypothesis(r) => Some(r),
            _ => None,
        }
    }

    fn confidence_score(&self) -> f64 {
        self.confidence_score
    }
}

impl AnalysisPayload for TargetedAnalysis {
    const KIND: AnalysisKind = AnalysisKind::TargetedAnalysis;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::TargetedAnalysis(self)
    }

    fn from_result(result: AnalysisResult) -> Option<Self> {
        match result {
            AnalysisResult::TargetedAnalysis(r) => Some(r),
            _ => None,
        }
    }

    fn confidence_score(&self) -> f64 {
        self.confidence_score
    }
}

impl AnalysisPayload for AgentForecast {
    const KIND: AnalysisKind = AnalysisKind::AgentForecast;

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::AgentForecast(self)
    }

    fn from_result(result: AnalysisResult) -> Option<Self> {
        match result {
            AnalysisResult::AgentForecast(r) => Some(r),
            _ => None,
        }
    }

    fn confidence_score(&self) -> f64 {
        self.confidence_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in AnalysisKind::ALL {
            assert_eq!(kind.as_str().parse::<AnalysisKind>().unwrap(), kind);
        }
        assert!("forecast".parse::<AnalysisKind>().is_err());
    }

    #[test]
    fn result_is_tagged_by_kind() {
        let result = DiscoveryResult::empty(3).into_result();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "discovery");
        assert_eq!(json["payload"]["total_tickets"], 3);
        assert_eq!(result.kind(), AnalysisKind::Discovery);
    }

    #[test]
    fn from_result_rejects_other_kinds() {
        let result = DiscoveryResult::empty(0).into_result();
        assert!(HypothesisSet::from_result(result.clone()).is_none());
        assert!(DiscoveryResult::from_result(result).is_some());
    }
}
