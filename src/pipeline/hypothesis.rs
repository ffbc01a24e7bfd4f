//! Hypothesis formation: turn discovered patterns into testable hypotheses

use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::contract::{validate_discovery, validate_hypotheses};
use super::{contract_error, invoke_phase, PhaseContext, PhaseError};
use crate::types::{AnalysisKind, BusinessContext, DiscoveryResult, HypothesisSet};

const PHASE: AnalysisKind = AnalysisKind::Hypothesis;

#[derive(Serialize)]
struct HypothesisRequest<'a> {
    discovery: &'a DiscoveryResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    business_context: Option<&'a BusinessContext>,
}

pub async fn run_hypothesis(
    ctx: &PhaseContext,
    discovery: &DiscoveryResult,
    business_context: &BusinessContext,
) -> Result<HypothesisSet, PhaseError> {
    validate_discovery(discovery, None).map_err(|violation| PhaseError::UpstreamIncomplete {
        phase: PHASE,
        missing: violation.to_string(),
    })?;

    if discovery.patterns.is_empty() {
        info!("Hypothesis formation skipped: discovery found no patterns");
        return Ok(HypothesisSet::empty());
    }

    let request = HypothesisRequest {
        discovery,
        business_context: (!business_context.is_empty()).then_some(business_context),
    };

    info!(
        patterns = discovery.patterns.len(),
        with_context = request.business_context.is_some(),
        "Running hypothesis formation"
    );
    let set: HypothesisSet = invoke_phase(ctx, PHASE, &request).await?;

    let pattern_ids: HashSet<&str> = discovery.patterns.iter().map(|p| p.id.as_str()).collect();
    validate_hypotheses(&set, Some(&pattern_ids)).map_err(contract_error(PHASE))?;

    info!(
        hypotheses = set.hypotheses.len(),
        phases = set.investigation_plan.phases.len(),
        confidence = set.confidence_score,
        "Hypothesis formation complete"
    );
    Ok(set)
}
