//! Forecast Batching Tests
//!
//! Per-agent forecasting through the flow optimizer: batch shapes, skipped
//! agents, bounded concurrency, cache reuse, cancellation and the
//! confidence-gated re-run.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use support_insights::pipeline::{group_by_agent, AgentWorkload};
use support_insights::scheduler::BatchConfig;
use support_insights::types::{Ticket, TicketPriority, TicketStatus};
use support_insights::{
    should_rerun, FlowOptimizer, FlowSettings, InferenceBackend, InferenceRequest, PhaseContext,
    Redactor, ResultCache,
};

/// Forecasts every agent; tracks calls and peak in-flight requests
#[derive(Default)]
struct ForecastBackend {
    confidence: Mutex<HashMap<String, f64>>,
    delay_ms: u64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ForecastBackend {
    fn with_delay(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay_ms,
            ..Self::default()
        })
    }

    fn set_confidence(&self, agent: &str, value: f64) {
        self.confidence.lock().unwrap().insert(agent.to_string(), value);
    }
}

#[async_trait]
impl InferenceBackend for ForecastBackend {
    async fn invoke(&self, request: &InferenceRequest) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let agent = request.input["agent_id"].as_str().unwrap_or_default();
        let confidence = self
            .confidence
            .lock()
            .unwrap()
            .get(agent)
            .copied()
            .unwrap_or(0.85);
        Ok(json!({
            "predicted_resolution_hours": 7.5,
            "predicted_satisfaction": 3.9,
            "workload_trend": "rising",
            "burnout_risk": 0.35,
            "drivers": ["refund backlog"],
            "confidence_score": confidence
        })
        .to_string())
    }

    fn backend_name(&self) -> &'static str {
        "ForecastBackend"
    }
}

fn ticket(id: &str, agent: Option<&str>, age_hours: i64) -> Ticket {
    let created = Utc::now() - ChronoDuration::hours(age_hours);
    Ticket {
        id: id.to_string(),
        subject: "Cannot log in".to_string(),
        description: String::new(),
        status: TicketStatus::Open,
        priority: TicketPriority::Medium,
        category: Some("account".to_string()),
        channel: None,
        assignee_id: agent.map(str::to_string),
        customer_id: None,
        created_at: created,
        resolved_at: None,
        satisfaction: None,
        messages: vec![],
    }
}

fn flow(backend: Arc<ForecastBackend>, batch: BatchConfig) -> FlowOptimizer {
    let ctx = PhaseContext::new(backend, Redactor::with_default_scrubber(200).unwrap(), 3);
    FlowOptimizer::new(
        Arc::new(ResultCache::in_memory(Duration::from_secs(600))),
        ctx,
        FlowSettings {
            batch,
            ..FlowSettings::default()
        },
    )
}

fn roster_and_tickets(agents_with_work: usize, idle_agents: usize) -> (Vec<String>, Vec<Ticket>) {
    let mut roster = Vec::new();
    let mut tickets = Vec::new();
    for a in 0..agents_with_work {
        let agent = format!("agent-{a:02}");
        for t in 0..=(a % 3) {
            tickets.push(ticket(&format!("T-{a}-{t}"), Some(&agent), (t as i64) + 1));
        }
        roster.push(agent);
    }
    for i in 0..idle_agents {
        roster.push(format!("idle-{i}"));
    }
    tickets.push(ticket("T-unassigned", None, 1));
    (roster, tickets)
}

#[tokio::test]
async fn test_twelve_agents_batch_size_five_issues_three_batches() {
    let backend = ForecastBackend::with_delay(0);
    let flow = flow(backend.clone(), BatchConfig::new(5, 3, Duration::ZERO));
    let (roster, tickets) = roster_and_tickets(12, 3);
    let workloads = group_by_agent(&tickets, &roster);
    assert_eq!(workloads.len(), 15);

    let report = flow.forecast_agents(&workloads).await.unwrap();

    assert_eq!(report.batch_sizes, vec![5, 5, 2]);
    assert_eq!(report.forecasts.len(), 12);
    assert_eq!(report.skipped, vec!["idle-0", "idle-1", "idle-2"]);
    assert!(report.forecasts.iter().all(|f| f.agent_id.starts_with("agent-")));
    assert!(report.forecasts.iter().all(|f| f.ticket_count > 0));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 12);
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_inference_concurrency_stays_bounded() {
    let backend = ForecastBackend::with_delay(20);
    let flow = flow(backend.clone(), BatchConfig::new(2, 2, Duration::ZERO));
    let (roster, tickets) = roster_and_tickets(10, 0);
    let workloads = group_by_agent(&tickets, &roster);

    let report = flow.forecast_agents(&workloads).await.unwrap();

    assert_eq!(report.forecasts.len(), 10);
    assert!(backend.peak.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn test_second_job_reuses_cached_forecasts() {
    let backend = ForecastBackend::with_delay(0);
    let flow = flow(backend.clone(), BatchConfig::new(5, 3, Duration::ZERO));
    let (roster, tickets) = roster_and_tickets(6, 1);
    let workloads = group_by_agent(&tickets, &roster);

    let first = flow.forecast_agents(&workloads).await.unwrap();
    let second = flow.forecast_agents(&workloads).await.unwrap();

    assert_eq!(first.computed, 6);
    assert_eq!(second.cache_hits, 6);
    assert_eq!(second.forecasts, first.forecasts);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_new_ticket_changes_only_that_agents_key() {
    let backend = ForecastBackend::with_delay(0);
    let flow = flow(backend.clone(), BatchConfig::new(5, 3, Duration::ZERO));
    let (roster, mut tickets) = roster_and_tickets(4, 0);

    flow.forecast_agents(&group_by_agent(&tickets, &roster))
        .await
        .unwrap();
    tickets.push(ticket("T-new", Some("agent-02"), 0));
    let report = flow
        .forecast_agents(&group_by_agent(&tickets, &roster))
        .await
        .unwrap();

    assert_eq!(report.cache_hits, 3);
    assert_eq!(report.computed, 1);
    assert_eq!(report.forecast_for("agent-02").unwrap().ticket_count, 4);
}

#[tokio::test]
async fn test_cancelled_job_starts_no_batches() {
    let backend = ForecastBackend::with_delay(0);
    let flow = flow(backend.clone(), BatchConfig::new(5, 3, Duration::ZERO));
    let (roster, tickets) = roster_and_tickets(8, 0);
    let workloads = group_by_agent(&tickets, &roster);

    let scheduler = flow.scheduler().unwrap();
    flow.cancel();
    let report = flow.forecast_agents_with(&scheduler, &workloads).await;

    assert!(report.cancelled);
    assert!(report.forecasts.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.progress().completed, 0);
}

#[tokio::test]
async fn test_low_confidence_rerun_leaves_confident_agents_alone() {
    let backend = ForecastBackend::with_delay(0);
    backend.set_confidence("agent-01", 0.3);
    backend.set_confidence("agent-03", 0.59);
    let flow = flow(backend.clone(), BatchConfig::new(5, 3, Duration::ZERO));
    let (roster, tickets) = roster_and_tickets(5, 0);
    let workloads: Vec<AgentWorkload> = group_by_agent(&tickets, &roster);

    let first = flow.forecast_agents(&workloads).await.unwrap();
    assert_eq!(first.low_confidence().count(), 2);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 5);

    backend.set_confidence("agent-01", 0.9);
    let outcome = flow
        .rerun_low_confidence(&first.forecasts, &workloads)
        .await
        .unwrap();

    assert_eq!(outcome.rerun_ids, vec!["agent-01", "agent-03"]);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 7);
    assert_eq!(outcome.forecasts.len(), 5);
    let ids: Vec<&str> = outcome.forecasts.iter().map(|f| f.agent_id.as_str()).collect();
    assert_eq!(ids, vec!["agent-00", "agent-01", "agent-02", "agent-03", "agent-04"]);

    let still_low: Vec<&str> = outcome
        .forecasts
        .iter()
        .filter(|f| should_rerun(f.confidence_score))
        .map(|f| f.agent_id.as_str())
        .collect();
    assert_eq!(still_low, vec!["agent-03"]);
}
