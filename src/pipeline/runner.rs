//! Sequential driver for Discovery → Hypothesis → Targeted Analysis
//!
//! Every phase goes through the flow optimizer, so a repeated run over the
//! same tickets and options is served from cache phase by phase. A phase only
//! starts once the previous phase's output has been validated.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{run_discovery, run_hypothesis, run_targeted, DiscoveryInput, PhaseError, TargetedInput};
use crate::fingerprint::{mode_digest, Fingerprint};
use crate::flow::{FlowOptimizer, PhaseOutcome};
use crate::types::{
    AnalysisKind, BusinessContext, DiscoveryResult, HypothesisSet, TargetedAnalysis, Ticket,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Discovery,
    Hypothesis,
    TargetedAnalysis,
    Completed,
    Failed { phase: AnalysisKind },
}

impl PipelineState {
    fn entering(phase: AnalysisKind) -> Self {
        match phase {
            AnalysisKind::Discovery => Self::Discovery,
            AnalysisKind::Hypothesis => Self::Hypothesis,
            _ => Self::TargetedAnalysis,
        }
    }
}

/// Per-run inputs besides the tickets themselves
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Overrides the flow optimizer's sample size when set
    pub sample_size: Option<usize>,
    /// Size of the full collection when `tickets` is already a subset
    pub declared_total: Option<usize>,
    pub business_context: BusinessContext,
    /// Overrides the configured tool list when non-empty
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub discovery: DiscoveryResult,
    pub hypotheses: HypothesisSet,
    pub targeted: TargetedAnalysis,
    /// Phases served from cache
    pub cache_hits: Vec<AnalysisKind>,
    pub fingerprints: Vec<(AnalysisKind, Fingerprint)>,
}

#[derive(Debug, thiserror::Error)]
#[error("pipeline stopped at {phase}")]
pub struct PipelineError {
    pub phase: AnalysisKind,
    #[source]
    pub source: PhaseError,
}

impl PipelineError {
    pub fn state(&self) -> PipelineState {
        PipelineState::Failed { phase: self.phase }
    }
}

pub struct AnalysisPipeline {
    flow: Arc<FlowOptimizer>,
}

#[derive(Default)]
struct RunTrace {
    cache_hits: Vec<AnalysisKind>,
    fingerprints: Vec<(AnalysisKind, Fingerprint)>,
}

impl RunTrace {
    fn record<T>(&mut self, kind: AnalysisKind, outcome: PhaseOutcome<T>) -> T {
        if outcome.cache_hit {
            self.cache_hits.push(kind);
        }
        self.fingerprints.push((kind, outcome.fingerprint));
        outcome.data
    }
}

impl AnalysisPipeline {
    pub fn new(flow: Arc<FlowOptimizer>) -> Self {
        Self { flow }
    }

    pub fn flow(&self) -> &Arc<FlowOptimizer> {
        &self.flow
    }

    pub async fn run(
        &self,
        tickets: &[Ticket],
        options: &PipelineOptions,
    ) -> Result<PipelineRun, PipelineError> {
        let flow = &self.flow;
        let ctx = flow.context();
        let settings = flow.settings();
        let sample_size = options.sample_size.unwrap_or(settings.sample_size);
        let tools: &[String] = if options.tools.is_empty() {
            &settings.available_tools
        } else {
            &options.tools
        };
        let mut trace = RunTrace::default();

        // Phase 1
        transition(AnalysisKind::Discovery);
        let total = options.declared_total.unwrap_or(tickets.len());
        let mode = format!(
            "discovery:sample={sample_size}:total={total}:{}",
            ctx.limits_tag()
        );
        let key = flow.fingerprint_for(tickets, &mode);
        let discovery = flow
            .execute_phase(key, || {
                run_discovery(
                    ctx,
                    DiscoveryInput {
                        tickets,
                        sample_size,
                        declared_total: options.declared_total,
                    },
                )
            })
            .await
            .map_err(failed(AnalysisKind::Discovery))?;
        let discovery = trace.record(AnalysisKind::Discovery, discovery);

        // Phase 2
        transition(AnalysisKind::Hypothesis);
        let mode = format!(
            "hypothesis:{}:{}",
            mode_digest(&discovery),
            mode_digest(&options.business_context)
        );
        let key = flow.fingerprint_for(tickets, &mode);
        let hypotheses = flow
            .execute_phase(key, || run_hypothesis(ctx, &discovery, &options.business_context))
            .await
            .map_err(failed(AnalysisKind::Hypothesis))?;
        let hypotheses = trace.record(AnalysisKind::Hypothesis, hypotheses);

        // Phase 3
        transition(AnalysisKind::TargetedAnalysis);
        let mode = format!(
            "targeted:{}:{}:sample={sample_size}:{}",
            mode_digest(&hypotheses),
            mode_digest(&tools),
            ctx.limits_tag()
        );
        let key = flow.fingerprint_for(tickets, &mode);
        let targeted = flow
            .execute_phase(key, || {
                run_targeted(
                    ctx,
                    TargetedInput {
                        hypotheses: &hypotheses,
                        tools,
                        tickets,
                        sample_size,
                    },
                )
            })
            .await
            .map_err(failed(AnalysisKind::TargetedAnalysis))?;
        let targeted = trace.record(AnalysisKind::TargetedAnalysis, targeted);

        info!(
            patterns = discovery.patterns.len(),
            hypotheses = hypotheses.hypotheses.len(),
            cached_phases = trace.cache_hits.len(),
            "Pipeline completed"
        );

        Ok(PipelineRun {
            state: PipelineState::Completed,
            discovery,
            hypotheses,
            targeted,
            cache_hits: trace.cache_hits,
            fingerprints: trace.fingerprints,
        })
    }
}

fn transition(phase: AnalysisKind) {
    info!(state = ?PipelineState::entering(phase), "Pipeline phase starting");
}

fn failed(phase: AnalysisKind) -> impl Fn(PhaseError) -> PipelineError {
    move |source| {
        warn!(phase = %phase, error = %source, "Pipeline phase failed");
        PipelineError { phase, source }
    }
}
