//! Discovery phase: what is going on in this ticket collection?

use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::contract::validate_discovery;
use super::{contract_error, invoke_phase, PhaseContext, PhaseError};
use crate::preprocess::TicketSummary;
use crate::privacy::TicketDigest;
use crate::types::{AnalysisKind, DiscoveryResult, Ticket};

const PHASE: AnalysisKind = AnalysisKind::Discovery;

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryInput<'a> {
    pub tickets: &'a [Ticket],
    /// Maximum number of tickets forwarded
    pub sample_size: usize,
    /// Size of the full collection when `tickets` is itself a page of it
    pub declared_total: Option<usize>,
}

#[derive(Serialize)]
struct DiscoveryRequest<'a> {
    total_tickets: usize,
    sample_size: usize,
    summary: &'a TicketSummary,
    tickets: Vec<TicketDigest>,
}

/// Deterministic prefix sample, so identical input order gives identical results
pub fn discovery_sample(tickets: &[Ticket], sample_size: usize) -> &[Ticket] {
    &tickets[..tickets.len().min(sample_size)]
}

pub async fn run_discovery(
    ctx: &PhaseContext,
    input: DiscoveryInput<'_>,
) -> Result<DiscoveryResult, PhaseError> {
    if input.sample_size == 0 {
        return Err(PhaseError::InvalidInput {
            phase: PHASE,
            message: "sample_size must be at least 1".to_string(),
        });
    }
    let total = input.declared_total.unwrap_or(input.tickets.len());
    if total < input.tickets.len() {
        return Err(PhaseError::InvalidInput {
            phase: PHASE,
            message: format!(
                "declared total {total} is smaller than the {} tickets supplied",
                input.tickets.len()
            ),
        });
    }

    if input.tickets.is_empty() {
        info!(total, "Discovery skipped: no tickets");
        return Ok(DiscoveryResult::empty(total));
    }

    let sample = discovery_sample(input.tickets, input.sample_size);
    let summary = TicketSummary::from_tickets(input.tickets);
    let request = DiscoveryRequest {
        total_tickets: total,
        sample_size: sample.len(),
        summary: &summary,
        tickets: TicketDigest::from_tickets(sample, &ctx.redactor, ctx.max_messages),
    };

    info!(total, sampled = sample.len(), "Running discovery");
    let mut result: DiscoveryResult = invoke_phase(ctx, PHASE, &request).await?;
    result.total_tickets = total;
    result.sampled_tickets = sample.len();

    let sample_ids: HashSet<&str> = sample.iter().map(|t| t.id.as_str()).collect();
    validate_discovery(&result, Some(&sample_ids)).map_err(contract_error(PHASE))?;

    info!(
        patterns = result.patterns.len(),
        anomalies = result.anomalies.len(),
        confidence = result.confidence_score,
        "Discovery complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{context, ticket, ScriptedBackend};
    use serde_json::json;

    fn response(example: &str) -> serde_json::Value {
        json!({
            "data_quality_score": 0.9,
            "dimensions": [
                {"dimension": "category", "buckets": [{"label": "billing", "count": 3, "share": 1.0}]}
            ],
            "patterns": [{
                "id": "p1",
                "description": "Duplicate charges cluster after releases",
                "confidence": 0.8,
                "impact": "high",
                "evidence": ["3 of 3 tickets mention double charge"],
                "example_ticket_ids": [example]
            }],
            "anomalies": [],
            "recommendations": ["Audit the payment retry path"],
            "confidence_score": 0.75
        })
    }

    #[tokio::test]
    async fn test_empty_collection_skips_inference() {
        let backend = ScriptedBackend::new(vec![]);
        let ctx = context(backend.clone());
        let result = run_discovery(
            &ctx,
            DiscoveryInput {
                tickets: &[],
                sample_size: 50,
                declared_total: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(result.confidence_score, 0.0);
        assert!(result.patterns.is_empty());
        assert!(result.anomalies.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_prefix_sample_and_totals() {
        let tickets: Vec<Ticket> = (0..5).map(|i| ticket(&format!("T-{i}"), None)).collect();
        let backend = ScriptedBackend::replying(response("T-1"));
        let ctx = context(backend.clone());

        let result = run_discovery(
            &ctx,
            DiscoveryInput {
                tickets: &tickets,
                sample_size: 2,
                declared_total: Some(40),
            },
        )
        .await
        .unwrap();

        assert_eq!(result.total_tickets, 40);
        assert_eq!(result.sampled_tickets, 2);

        let requests = backend.requests.lock().unwrap();
        let sent = requests[0].input["tickets"].as_array().unwrap();
        let ids: Vec<&str> = sent.iter().map(|t| t["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["T-0", "T-1"]);
    }

    #[tokio::test]
    async fn test_example_outside_sample_is_rejected() {
        let tickets: Vec<Ticket> = (0..5).map(|i| ticket(&format!("T-{i}"), None)).collect();
        let ctx = context(ScriptedBackend::replying(response("T-4")));

        let err = run_discovery(
            &ctx,
            DiscoveryInput {
                tickets: &tickets,
                sample_size: 2,
                declared_total: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PhaseError::Contract { .. }));
    }

    #[tokio::test]
    async fn test_unparsable_response_fails() {
        let tickets = vec![ticket("T-1", None)];
        let ctx = context(ScriptedBackend::new(vec![Ok("Sorry, I can't".to_string())]));
        let err = run_discovery(
            &ctx,
            DiscoveryInput {
                tickets: &tickets,
                sample_size: 10,
                declared_total: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PhaseError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_missing_field_is_not_defaulted() {
        let tickets = vec![ticket("T-1", None)];
        let mut body = response("T-1");
        body.as_object_mut().unwrap().remove("patterns");
        let ctx = context(ScriptedBackend::replying(body));

        let err = run_discovery(
            &ctx,
            DiscoveryInput {
                tickets: &tickets,
                sample_size: 10,
                declared_total: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PhaseError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_anomaly_without_affected_tickets_is_rejected() {
        let tickets = vec![ticket("T-1", None)];
        let mut body = response("T-1");
        body["anomalies"] = json!([{
            "description": "Spike of refunds on one day",
            "severity": "medium",
            "confidence": 0.6
        }]);
        let ctx = context(ScriptedBackend::replying(body));

        let err = run_discovery(
            &ctx,
            DiscoveryInput {
                tickets: &tickets,
                sample_size: 10,
                declared_total: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PhaseError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_declared_total_below_supplied_count() {
        let tickets = vec![ticket("T-1", None), ticket("T-2", None)];
        let ctx = context(ScriptedBackend::new(vec![]));
        let err = run_discovery(
            &ctx,
            DiscoveryInput {
                tickets: &tickets,
                sample_size: 10,
                declared_total: Some(1),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PhaseError::InvalidInput { .. }));
    }
}
