//! Per-agent forecast phase
//!
//! One inference call per agent workload. Batching, caching and re-runs live
//! in [`crate::flow`].

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::contract::validate_forecast;
use super::{contract_error, invoke_phase, PhaseContext, PhaseError};
use crate::preprocess::TicketSummary;
use crate::privacy::TicketDigest;
use crate::types::{AgentForecast, AnalysisKind, Ticket};

const PHASE: AnalysisKind = AnalysisKind::AgentForecast;

/// Tickets assigned to one agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentWorkload {
    pub agent_id: String,
    pub tickets: Vec<Ticket>,
}

impl AgentWorkload {
    pub fn new(agent_id: impl Into<String>, tickets: Vec<Ticket>) -> Self {
        Self {
            agent_id: agent_id.into(),
            tickets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// Group tickets by assignee.
///
/// Every roster agent gets a workload, possibly empty, in roster order; agents
/// that only appear as assignees follow in first-seen order. Unassigned
/// tickets are dropped.
pub fn group_by_agent(tickets: &[Ticket], roster: &[String]) -> Vec<AgentWorkload> {
    let mut order: Vec<String> = roster.to_vec();
    let mut grouped: HashMap<String, Vec<Ticket>> = HashMap::new();

    for ticket in tickets {
        let Some(agent) = &ticket.assignee_id else {
            continue;
        };
        if !grouped.contains_key(agent) && !order.contains(agent) {
            order.push(agent.clone());
        }
        grouped.entry(agent.clone()).or_default().push(ticket.clone());
    }

    let mut seen = std::collections::HashSet::new();
    order
        .into_iter()
        .filter(|agent| seen.insert(agent.clone()))
        .map(|agent| {
            let tickets = grouped.remove(&agent).unwrap_or_default();
            AgentWorkload::new(agent, tickets)
        })
        .collect()
}

#[derive(Serialize)]
struct ForecastRequest<'a> {
    agent_id: &'a str,
    ticket_count: usize,
    open_tickets: usize,
    summary: TicketSummary,
    recent_tickets: Vec<TicketDigest>,
}

/// Forecast one agent from their tickets.
///
/// `sample_size` caps how many of the most recent tickets are forwarded.
pub async fn run_agent_forecast(
    ctx: &PhaseContext,
    workload: &AgentWorkload,
    sample_size: usize,
) -> Result<AgentForecast, PhaseError> {
    if workload.is_empty() {
        return Err(PhaseError::EmptyInput { phase: PHASE });
    }

    let mut recent: Vec<&Ticket> = workload.tickets.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    recent.truncate(sample_size);

    let request = ForecastRequest {
        agent_id: &workload.agent_id,
        ticket_count: workload.tickets.len(),
        open_tickets: workload.tickets.iter().filter(|t| !t.status.is_done()).count(),
        summary: TicketSummary::from_tickets(&workload.tickets),
        recent_tickets: recent
            .into_iter()
            .map(|t| TicketDigest::from_ticket(t, &ctx.redactor, ctx.max_messages))
            .collect(),
    };

    let mut forecast: AgentForecast = invoke_phase(ctx, PHASE, &request).await?;
    forecast.agent_id = workload.agent_id.clone();
    forecast.ticket_count = workload.tickets.len();
    validate_forecast(&forecast).map_err(contract_error(PHASE))?;

    debug!(
        agent = %workload.agent_id,
        confidence = forecast.confidence_score,
        "Agent forecast computed"
    );
    Ok(forecast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{context, ticket, ScriptedBackend};
    use serde_json::json;

    #[test]
    fn test_group_by_agent_keeps_roster_order_and_empty_agents() {
        let tickets = vec![
            ticket("T-1", Some("b")),
            ticket("T-2", Some("a")),
            ticket("T-3", Some("b")),
            ticket("T-4", None),
            ticket("T-5", Some("z")),
        ];
        let roster = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let workloads = group_by_agent(&tickets, &roster);

        let summary: Vec<(&str, usize)> = workloads
            .iter()
            .map(|w| (w.agent_id.as_str(), w.tickets.len()))
            .collect();
        assert_eq!(summary, vec![("a", 1), ("b", 2), ("c", 0), ("z", 1)]);
    }

    #[tokio::test]
    async fn test_empty_workload_is_rejected_without_inference() {
        let backend = ScriptedBackend::new(vec![]);
        let ctx = context(backend.clone());
        let err = run_agent_forecast(&ctx, &AgentWorkload::new("a", vec![]), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, PhaseError::EmptyInput { .. }));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_identity_fields_come_from_workload() {
        let backend = ScriptedBackend::replying(json!({
            "agent_id": "someone-else",
            "predicted_resolution_hours": 6.5,
            "predicted_satisfaction": 4.1,
            "workload_trend": "rising",
            "burnout_risk": 0.4,
            "drivers": ["billing backlog"],
            "confidence_score": 0.7
        }));
        let ctx = context(backend);
        let workload = AgentWorkload::new("a1", vec![ticket("T-1", Some("a1")), ticket("T-2", Some("a1"))]);

        let forecast = run_agent_forecast(&ctx, &workload, 10).await.unwrap();
        assert_eq!(forecast.agent_id, "a1");
        assert_eq!(forecast.ticket_count, 2);
    }

    #[tokio::test]
    async fn test_out_of_range_burnout_fails() {
        let ctx = context(ScriptedBackend::replying(json!({
            "predicted_resolution_hours": 6.5,
            "predicted_satisfaction": 4.1,
            "workload_trend": "stable",
            "burnout_risk": 1.7,
            "drivers": [],
            "confidence_score": 0.7
        })));
        let workload = AgentWorkload::new("a1", vec![ticket("T-1", Some("a1"))]);
        let err = run_agent_forecast(&ctx, &workload, 10).await.unwrap_err();
        assert!(matches!(err, PhaseError::Contract { .. }));
    }

    #[tokio::test]
    async fn test_missing_drivers_is_not_defaulted() {
        let ctx = context(ScriptedBackend::replying(json!({
            "predicted_resolution_hours": 6.5,
            "predicted_satisfaction": 4.1,
            "workload_trend": "stable",
            "burnout_risk": 0.3,
            "confidence_score": 0.7
        })));
        let workload = AgentWorkload::new("a1", vec![ticket("T-1", Some("a1"))]);
        let err = run_agent_forecast(&ctx, &workload, 10).await.unwrap_err();
        assert!(matches!(err, PhaseError::MalformedResponse { .. }));
    }
}
