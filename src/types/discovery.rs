//! Discovery phase output: data quality, distributions, patterns, anomalies

use serde::{Deserialize, Serialize};

/// Business impact tier shared by patterns and anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactTier {
    Low,
    Medium,
    High,
    Critical,
}

/// One bucket of a dimension distribution (e.g. category = "billing")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: usize,
    /// Fraction of the sample in this bucket (0.0-1.0)
    pub share: f64,
}

/// Distribution of the sample along one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDistribution {
    pub dimension: String,
    pub buckets: Vec<DistributionBucket>,
}

/// A recurring pattern surfaced by discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPattern {
    pub id: String,
    pub description: String,
    /// 0.0-1.0
    pub confidence: f64,
    pub impact: ImpactTier,
    pub evidence: Vec<String>,
    /// Ticket IDs from the sample that exhibit the pattern
    pub example_ticket_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredAnomaly {
    pub description: String,
    pub severity: ImpactTier,
    /// 0.0-1.0
    pub confidence: f64,
    pub affected_ticket_ids: Vec<String>,
}

/// Discovery phase result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// Declared size of the full collection (filled in from the input, not the model)
    #[serde(default)]
    pub total_tickets: usize,
    /// Number of tickets actually sent for analysis
    #[serde(default)]
    pub sampled_tickets: usize,
    /// 0.0-1.0
    pub data_quality_score: f64,
    pub dimensions: Vec<DimensionDistribution>,
    pub patterns: Vec<DiscoveredPattern>,
    pub anomalies: Vec<DiscoveredAnomaly>,
    pub recommendations: Vec<String>,
    /// 0.0-1.0
    pub confidence_score: f64,
}

impl DiscoveryResult {
    /// Result for a collection with nothing to analyse
    pub fn empty(total_tickets: usize) -> Self {
        Self {
            total_tickets,
            sampled_tickets: 0,
            data_quality_score: 0.0,
            dimensions: Vec::new(),
            patterns: Vec::new(),
            anomalies: Vec::new(),
            recommendations: Vec::new(),
            confidence_score: 0.0,
        }
    }

    pub fn pattern(&self, id: &str) -> Option<&DiscoveredPattern> {
        self.patterns.iter().find(|p| p.id == id)
    }
}
