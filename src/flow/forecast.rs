//! Batched per-agent forecasting and confidence-driven re-runs

use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::FlowOptimizer;
use crate::fingerprint::Fingerprint;
use crate::pipeline::{run_agent_forecast, AgentWorkload};
use crate::scheduler::{BatchScheduler, SchedulerError};
use crate::types::AgentForecast;

/// Outcome of one forecasting job
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub job_id: Uuid,
    /// Forecasts in batch order (input order of the agents with work)
    pub forecasts: Vec<AgentForecast>,
    pub cache_hits: usize,
    pub computed: usize,
    /// Agents with no tickets; never sent to inference
    pub skipped: Vec<String>,
    pub failed_entities: Vec<String>,
    pub failed_batches: Vec<usize>,
    pub batch_sizes: Vec<usize>,
    pub cancelled: bool,
}

impl ForecastReport {
    pub fn forecast_for(&self, agent_id: &str) -> Option<&AgentForecast> {
        self.forecasts.iter().find(|f| f.agent_id == agent_id)
    }

    /// Forecasts eligible for a re-run
    pub fn low_confidence(&self) -> impl Iterator<Item = &AgentForecast> {
        self.forecasts
            .iter()
            .filter(|f| crate::confidence::should_rerun(f.confidence_score))
    }
}

/// Result of [`FlowOptimizer::rerun_low_confidence`]
#[derive(Debug, Clone, Serialize)]
pub struct RerunOutcome {
    /// Previous forecasts with re-run entries replaced, in the original order
    pub forecasts: Vec<AgentForecast>,
    pub rerun_ids: Vec<String>,
    pub report: ForecastReport,
}

enum EntityOutcome {
    Served(AgentForecast),
    Computed(AgentForecast),
    Failed(String),
}

impl FlowOptimizer {
    /// Per-agent cache key: the agent's tickets under an agent-scoped mode
    pub fn forecast_fingerprint(&self, workload: &AgentWorkload) -> Fingerprint {
        let mode = format!(
            "agent_forecast:{}:recent={}:{}",
            workload.agent_id,
            self.settings.forecast_recent_tickets,
            self.ctx.limits_tag()
        );
        self.fingerprint_for(&workload.tickets, &mode)
    }

    /// Forecast every agent with work, reusing cached forecasts
    pub async fn forecast_agents(
        &self,
        workloads: &[AgentWorkload],
    ) -> Result<ForecastReport, SchedulerError> {
        let scheduler = self.scheduler()?;
        Ok(self.forecast_agents_with(&scheduler, workloads).await)
    }

    /// As [`Self::forecast_agents`], on a caller-owned scheduler (for progress
    /// or cancellation)
    pub async fn forecast_agents_with(
        &self,
        scheduler: &BatchScheduler,
        workloads: &[AgentWorkload],
    ) -> ForecastReport {
        self.forecast_with(scheduler, workloads.iter().collect(), false)
            .await
    }

    /// Recompute the named agents, bypassing and overwriting their cache
    /// entries. Unknown IDs are ignored; repeating the call is harmless.
    pub async fn rerun(
        &self,
        workloads: &[AgentWorkload],
        agent_ids: &[String],
    ) -> Result<ForecastReport, SchedulerError> {
        let wanted: HashSet<&str> = agent_ids.iter().map(String::as_str).collect();
        let selected: Vec<&AgentWorkload> = workloads
            .iter()
            .filter(|w| wanted.contains(w.agent_id.as_str()))
            .collect();

        for id in &wanted {
            if !workloads.iter().any(|w| w.agent_id == *id) {
                debug!(agent = %id, "Re-run requested for unknown agent, ignoring");
            }
        }

        let scheduler = self.scheduler()?;
        Ok(self.forecast_with(&scheduler, selected, true).await)
    }

    /// Re-run only the agents whose previous forecast fell below the
    /// confidence threshold, and merge the fresh results in.
    pub async fn rerun_low_confidence(
        &self,
        previous: &[AgentForecast],
        workloads: &[AgentWorkload],
    ) -> Result<RerunOutcome, SchedulerError> {
        let rerun_ids: Vec<String> = previous
            .iter()
            .filter(|f| self.should_rerun(f.confidence_score))
            .map(|f| f.agent_id.clone())
            .collect();

        info!(
            total = previous.len(),
            rerun = rerun_ids.len(),
            "Re-running low-confidence forecasts"
        );
        let report = self.rerun(workloads, &rerun_ids).await?;

        let fresh: HashMap<&str, &AgentForecast> = report
            .forecasts
            .iter()
            .map(|f| (f.agent_id.as_str(), f))
            .collect();
        let forecasts = previous
            .iter()
            .map(|f| fresh.get(f.agent_id.as_str()).map_or_else(|| f.clone(), |n| (*n).clone()))
            .collect();

        Ok(RerunOutcome {
            forecasts,
            rerun_ids,
            report,
        })
    }

    async fn forecast_with(
        &self,
        scheduler: &BatchScheduler,
        workloads: Vec<&AgentWorkload>,
        force: bool,
    ) -> ForecastReport {
        let (active, idle): (Vec<&AgentWorkload>, Vec<&AgentWorkload>) =
            workloads.into_iter().partition(|w| !w.is_empty());
        let skipped: Vec<String> = idle.iter().map(|w| w.agent_id.clone()).collect();
        if !skipped.is_empty() {
            debug!(agents = ?skipped, "Skipping agents with no tickets");
        }

        let report = scheduler
            .run_with_report(active, |batch, _index| async move {
                let outcomes = join_all(batch.into_iter().map(|w| self.forecast_one(w, force))).await;
                Ok::<_, Infallible>(outcomes)
            })
            .await;

        let mut forecasts = Vec::with_capacity(report.results.len());
        let mut failed_entities = Vec::new();
        let (mut cache_hits, mut computed) = (0, 0);
        for outcome in report.results {
            match outcome {
                EntityOutcome::Served(f) => {
                    cache_hits += 1;
                    forecasts.push(f);
                }
                EntityOutcome::Computed(f) => {
                    computed += 1;
                    forecasts.push(f);
                }
                EntityOutcome::Failed(agent_id) => failed_entities.push(agent_id),
            }
        }

        info!(
            job_id = %report.job_id,
            forecasts = forecasts.len(),
            cache_hits,
            computed,
            skipped = skipped.len(),
            failed = failed_entities.len(),
            "Agent forecasting finished"
        );

        ForecastReport {
            job_id: report.job_id,
            forecasts,
            cache_hits,
            computed,
            skipped,
            failed_entities,
            failed_batches: report.failed_batches,
            batch_sizes: report.batch_sizes,
            cancelled: report.cancelled,
        }
    }

    async fn forecast_one(&self, workload: &AgentWorkload, force: bool) -> EntityOutcome {
        let fingerprint = self.forecast_fingerprint(workload);
        let recent = self.settings.forecast_recent_tickets;
        let compute = || run_agent_forecast(&self.ctx, workload, recent);

        let result = if force {
            self.execute_phase_fresh(fingerprint, compute).await
        } else {
            self.execute_phase(fingerprint, compute).await
        };

        match result {
            Ok(outcome) if outcome.cache_hit => EntityOutcome::Served(outcome.data),
            Ok(outcome) => EntityOutcome::Computed(outcome.data),
            Err(e) => {
                warn!(agent = %workload.agent_id, error = %e, "Agent forecast failed");
                EntityOutcome::Failed(workload.agent_id.clone())
            }
        }
    }
}
