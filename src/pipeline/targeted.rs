//! Targeted analysis: test each hypothesis against ticket data

use serde::Serialize;
use tracing::info;

use super::contract::{validate_hypotheses, validate_targeted};
use super::discovery::discovery_sample;
use super::{contract_error, invoke_phase, PhaseContext, PhaseError};
use crate::preprocess::TicketSummary;
use crate::privacy::TicketDigest;
use crate::types::{
    AnalysisKind, Hypothesis, HypothesisSet, InvestigationPlan, TargetedAnalysis, Ticket,
};

const PHASE: AnalysisKind = AnalysisKind::TargetedAnalysis;

#[derive(Debug, Clone, Copy)]
pub struct TargetedInput<'a> {
    pub hypotheses: &'a HypothesisSet,
    /// Analysis tools the backend may use (e.g. "sql", "trend_analysis")
    pub tools: &'a [String],
    pub tickets: &'a [Ticket],
    pub sample_size: usize,
}

#[derive(Serialize)]
struct TargetedRequest<'a> {
    hypotheses: &'a [Hypothesis],
    investigation_plan: &'a InvestigationPlan,
    available_tools: &'a [String],
    summary: TicketSummary,
    sample: Vec<TicketDigest>,
}

pub async fn run_targeted(
    ctx: &PhaseContext,
    input: TargetedInput<'_>,
) -> Result<TargetedAnalysis, PhaseError> {
    validate_hypotheses(input.hypotheses, None).map_err(|violation| {
        PhaseError::UpstreamIncomplete {
            phase: PHASE,
            missing: violation.to_string(),
        }
    })?;

    if input.hypotheses.hypotheses.is_empty() {
        info!("Targeted analysis skipped: no hypotheses to test");
        return Ok(TargetedAnalysis::empty());
    }

    let sample = discovery_sample(input.tickets, input.sample_size);
    let request = TargetedRequest {
        hypotheses: &input.hypotheses.hypotheses,
        investigation_plan: &input.hypotheses.investigation_plan,
        available_tools: input.tools,
        summary: TicketSummary::from_tickets(input.tickets),
        sample: TicketDigest::from_tickets(sample, &ctx.redactor, ctx.max_messages),
    };

    info!(
        hypotheses = input.hypotheses.hypotheses.len(),
        tools = input.tools.len(),
        sampled = sample.len(),
        "Running targeted analysis"
    );
    let analysis: TargetedAnalysis = invoke_phase(ctx, PHASE, &request).await?;
    validate_targeted(&analysis, input.hypotheses).map_err(contract_error(PHASE))?;

    info!(
        results = analysis.results.len(),
        confidence = analysis.confidence_score,
        "Targeted analysis complete"
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{context, ticket, ScriptedBackend};
    use crate::types::{
        HypothesisType, InvestigationPhase, PriorityTier, RiskAssessment,
    };
    use serde_json::json;

    fn hypotheses() -> HypothesisSet {
        HypothesisSet {
            hypotheses: vec![Hypothesis {
                id: "h1".to_string(),
                statement: "Weekend staffing causes slow first response".to_string(),
                hypothesis_type: HypothesisType::Operational,
                priority: PriorityTier::Critical,
                confidence: 0.6,
                test_strategy: "Compare weekday vs weekend response times".to_string(),
                expected_outcome: "Weekend response 2x slower".to_string(),
                dependencies: vec![],
                source_pattern_ids: vec![],
            }],
            priority_matrix: vec![],
            investigation_plan: InvestigationPlan {
                phases: vec![InvestigationPhase {
                    name: "Staffing".to_string(),
                    order: 1,
                    hypotheses: vec!["h1".to_string()],
                    rationale: String::new(),
                }],
                dependencies: vec![],
            },
            risk_assessment: RiskAssessment::default(),
            success_criteria: vec![],
            confidence_score: 0.6,
        }
    }

    fn response() -> serde_json::Value {
        json!({
            "results": [{
                "hypothesis_id": "h1",
                "findings": [{"statement": "Weekend FRT 3.1h vs 1.2h", "evidence": [], "confidence": 0.8}],
                "metrics": [{"name": "weekend_frt_hours", "value": 3.1, "unit": "h"}],
                "verdict": "supported",
                "support_strength": "strong",
                "alternative_explanations": ["Weekend tickets skew toward harder categories"],
                "insights": [],
                "limitations": [],
                "recommended_actions": ["Add a weekend on-call rotation"],
                "confidence": 0.8
            }],
            "cross_hypothesis_insights": [],
            "methodology_notes": ["Compared first-response times by weekday"],
            "data_quality_caveats": [],
            "priority_findings": ["Add weekend coverage"],
            "confidence_score": 0.78
        })
    }

    #[tokio::test]
    async fn test_zero_hypotheses_skip_inference() {
        let backend = ScriptedBackend::new(vec![]);
        let ctx = context(backend.clone());
        let analysis = run_targeted(
            &ctx,
            TargetedInput {
                hypotheses: &HypothesisSet::empty(),
                tools: &[],
                tickets: &[ticket("T-1", None)],
                sample_size: 10,
            },
        )
        .await
        .unwrap();
        assert!(analysis.results.is_empty());
        assert_eq!(analysis.confidence_score, 0.0);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_request_carries_plan_tools_and_scrubbed_sample() {
        let backend = ScriptedBackend::replying(response());
        let ctx = context(backend.clone());
        let tools = vec!["trend_analysis".to_string()];
        let set = hypotheses();

        let analysis = run_targeted(
            &ctx,
            TargetedInput {
                hypotheses: &set,
                tools: &tools,
                tickets: &[ticket("T-1", Some("a1"))],
                sample_size: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(analysis.results[0].hypothesis_id, "h1");

        let requests = backend.requests.lock().unwrap();
        let input = &requests[0].input;
        assert_eq!(input["available_tools"][0], "trend_analysis");
        assert_eq!(input["investigation_plan"]["phases"][0]["hypotheses"][0], "h1");
        let sent = input.to_string();
        assert!(!sent.contains("alice@example.com"));
        assert!(!sent.contains("867-5309"));
    }

    #[tokio::test]
    async fn test_missing_result_for_hypothesis_fails() {
        let mut body = response();
        body["results"] = json!([]);
        let ctx = context(ScriptedBackend::replying(body));
        let set = hypotheses();
        let err = run_targeted(
            &ctx,
            TargetedInput {
                hypotheses: &set,
                tools: &[],
                tickets: &[ticket("T-1", None)],
                sample_size: 10,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PhaseError::Contract { .. }));
    }

    #[tokio::test]
    async fn test_missing_notes_are_not_defaulted() {
        for field in ["methodology_notes", "data_quality_caveats", "cross_hypothesis_insights"] {
            let mut body = response();
            body.as_object_mut().unwrap().remove(field);
            let ctx = context(ScriptedBackend::replying(body));
            let set = hypotheses();
            let err = run_targeted(
                &ctx,
                TargetedInput {
                    hypotheses: &set,
                    tools: &[],
                    tickets: &[ticket("T-1", None)],
                    sample_size: 10,
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, PhaseError::MalformedResponse { .. }), "{field}");
        }
    }

    #[tokio::test]
    async fn test_result_without_metrics_is_rejected() {
        let mut body = response();
        body["results"][0].as_object_mut().unwrap().remove("metrics");
        let ctx = context(ScriptedBackend::replying(body));
        let set = hypotheses();
        let err = run_targeted(
            &ctx,
            TargetedInput {
                hypotheses: &set,
                tools: &[],
                tickets: &[ticket("T-1", None)],
                sample_size: 10,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PhaseError::MalformedResponse { .. }));
    }
}
