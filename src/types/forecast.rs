//! Per-agent forecast produced by the batched forecasting workload

use serde::{Deserialize, Serialize};

/// Allowed CSAT range for predicted satisfaction
pub const SATISFACTION_MIN: f64 = 1.0;
pub const SATISFACTION_MAX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadTrend {
    Rising,
    Stable,
    Falling,
}

/// Forecast for one support agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentForecast {
    /// Filled in from the workload, not trusted from the model
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub ticket_count: usize,
    /// Expected mean resolution time (hours, >= 0)
    pub predicted_resolution_hours: f64,
    /// Expected CSAT (1.0-5.0)
    pub predicted_satisfaction: f64,
    pub workload_trend: WorkloadTrend,
    /// 0.0-1.0
    pub burnout_risk: f64,
    pub drivers: Vec<String>,
    /// 0.0-1.0
    pub confidence_score: f64,
}
