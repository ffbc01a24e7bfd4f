//! Hypothesis formation output: hypotheses, priority matrix, investigation plan

use serde::{Deserialize, Serialize};

/// Upper bound of priority-matrix scores (impact, effort, risk)
pub const PRIORITY_SCORE_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisType {
    Causal,
    Correlational,
    Operational,
    Behavioral,
    Process,
}

/// Investigation priority, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A testable hypothesis derived from discovered patterns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    pub statement: String,
    pub hypothesis_type: HypothesisType,
    pub priority: PriorityTier,
    /// 0.0-1.0
    pub confidence: f64,
    pub test_strategy: String,
    pub expected_outcome: String,
    /// IDs of hypotheses that must be tested first
    pub dependencies: Vec<String>,
    /// Discovery pattern IDs this hypothesis explains
    pub source_pattern_ids: Vec<String>,
}

/// Impact / effort / risk scoring for one hypothesis (each 0-10)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub hypothesis_id: String,
    pub impact: f64,
    pub effort: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationPhase {
    pub name: String,
    /// 1-based execution order
    pub order: u32,
    pub hypotheses: Vec<String>,
    pub rationale: String,
}

/// Ordering constraint between hypotheses inside the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDependency {
    pub hypothesis_id: String,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestigationPlan {
    pub phases: Vec<InvestigationPhase>,
    pub dependencies: Vec<PlanDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: RiskLevel,
    pub risks: Vec<String>,
    pub mitigations: Vec<String>,
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self {
            overall_risk: RiskLevel::Low,
            risks: Vec::new(),
            mitigations: Vec::new(),
        }
    }
}

/// Hypothesis formation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisSet {
    pub hypotheses: Vec<Hypothesis>,
    pub priority_matrix: Vec<PriorityScore>,
    pub investigation_plan: InvestigationPlan,
    pub risk_assessment: RiskAssessment,
    pub success_criteria: Vec<String>,
    /// 0.0-1.0
    pub confidence_score: f64,
}

impl HypothesisSet {
    /// Result when discovery surfaced nothing worth hypothesising about
    pub fn empty() -> Self {
        Self {
            hypotheses: Vec::new(),
            priority_matrix: Vec::new(),
            investigation_plan: InvestigationPlan::default(),
            risk_assessment: RiskAssessment::default(),
            success_criteria: Vec::new(),
            confidence_score: 0.0,
        }
    }

    pub fn hypothesis(&self, id: &str) -> Option<&Hypothesis> {
        self.hypotheses.iter().find(|h| h.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.hypotheses.iter().map(|h| h.id.as_str())
    }
}

/// Optional operator hints that steer hypothesis formation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    #[serde(default)]
    pub priorities: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
}

impl BusinessContext {
    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty() && self.constraints.is_empty() && self.goals.is_empty()
    }
}
