//! Analysis pipeline: Discovery → Hypothesis → Targeted Analysis
//!
//! Each phase:
//! 1. checks its upstream input (and short-circuits on empty input)
//! 2. builds a request whose free text is scrubbed ([`crate::privacy`])
//! 3. invokes the inference backend exactly once
//! 4. parses and validates the response against the phase contract
//!
//! Phases share no state; everything a phase needs is passed in. The
//! per-agent forecast is a fourth, independent phase driven in batches by
//! [`crate::flow`].

pub mod contract;
mod discovery;
mod forecast;
mod hypothesis;
mod runner;
mod targeted;

pub use contract::ContractViolation;
pub use discovery::{discovery_sample, run_discovery, DiscoveryInput};
pub use forecast::{group_by_agent, run_agent_forecast, AgentWorkload};
pub use hypothesis::run_hypothesis;
pub use runner::{AnalysisPipeline, PipelineError, PipelineOptions, PipelineRun, PipelineState};
pub use targeted::{run_targeted, TargetedInput};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::llm::{parsing, InferenceBackend, InferenceRequest};
use crate::privacy::Redactor;
use crate::types::AnalysisKind;

#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("{phase}: nothing to analyse")]
    EmptyInput { phase: AnalysisKind },
    #[error("{phase}: invalid input: {message}")]
    InvalidInput { phase: AnalysisKind, message: String },
    #[error("{phase}: inference failed: {message}")]
    Inference { phase: AnalysisKind, message: String },
    #[error("{phase}: malformed response: {message}")]
    MalformedResponse { phase: AnalysisKind, message: String },
    #[error("{phase}: contract violation: {violation}")]
    Contract {
        phase: AnalysisKind,
        violation: ContractViolation,
    },
    #[error("{phase}: upstream result is incomplete: {missing}")]
    UpstreamIncomplete { phase: AnalysisKind, missing: String },
}

impl PhaseError {
    pub fn phase(&self) -> AnalysisKind {
        match self {
            PhaseError::EmptyInput { phase }
            | PhaseError::InvalidInput { phase, .. }
            | PhaseError::Inference { phase, .. }
            | PhaseError::MalformedResponse { phase, .. }
            | PhaseError::Contract { phase, .. }
            | PhaseError::UpstreamIncomplete { phase, .. } => *phase,
        }
    }

    /// Inference failures may succeed on a later attempt; everything else is
    /// deterministic for the same input.
    pub fn is_transient(&self) -> bool {
        matches!(self, PhaseError::Inference { .. })
    }
}

/// Collaborators every phase needs
#[derive(Clone)]
pub struct PhaseContext {
    pub backend: Arc<dyn InferenceBackend>,
    pub redactor: Redactor,
    /// Conversation messages forwarded per ticket
    pub max_messages: usize,
}

impl PhaseContext {
    pub fn new(backend: Arc<dyn InferenceBackend>, redactor: Redactor, max_messages: usize) -> Self {
        Self {
            backend,
            redactor,
            max_messages,
        }
    }

    /// Truncation limits that shape every request, for folding into cache keys
    pub fn limits_tag(&self) -> String {
        format!("text={}:msgs={}", self.redactor.max_chars(), self.max_messages)
    }
}

/// Send one request and decode the response into `Resp`.
///
/// Decoding is strict: missing or mistyped fields fail the phase.
pub(crate) async fn invoke_phase<Req, Resp>(
    ctx: &PhaseContext,
    phase: AnalysisKind,
    request: &Req,
) -> Result<Resp, PhaseError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let request = InferenceRequest::new(phase, request).map_err(|e| PhaseError::InvalidInput {
        phase,
        message: e.to_string(),
    })?;

    let started = Instant::now();
    let raw = ctx
        .backend
        .invoke(&request)
        .await
        .map_err(|e| PhaseError::Inference {
            phase,
            message: format!("{e:#}"),
        })?;
    debug!(
        phase = %phase,
        backend = ctx.backend.backend_name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Inference call returned"
    );

    let value = parsing::extract_json(&raw)
        .map_err(|message| PhaseError::MalformedResponse { phase, message })?;
    serde_json::from_value(value).map_err(|e| PhaseError::MalformedResponse {
        phase,
        message: e.to_string(),
    })
}

pub(crate) fn contract_error(phase: AnalysisKind) -> impl Fn(ContractViolation) -> PhaseError {
    move |violation| PhaseError::Contract { phase, violation }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::types::{Ticket, TicketMessage, TicketPriority, TicketStatus};

    /// Backend that replays canned responses and records every request
    #[derive(Default)]
    pub struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<String, String>>>,
        pub requests: Mutex<Vec<InferenceRequest>>,
    }

    impl ScriptedBackend {
        pub fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn replying(json: serde_json::Value) -> Arc<Self> {
            Self::new(vec![Ok(json.to_string())])
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn invoke(&self, request: &InferenceRequest) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Err(anyhow::anyhow!("no scripted response left")),
            }
        }

        fn backend_name(&self) -> &'static str {
            "Scripted"
        }
    }

    pub fn context(backend: Arc<ScriptedBackend>) -> PhaseContext {
        let redactor = Redactor::with_default_scrubber(200).unwrap();
        PhaseContext::new(backend, redactor, 3)
    }

    pub fn ticket(id: &str, assignee: Option<&str>) -> Ticket {
        let created = Utc::now() - Duration::hours(10);
        Ticket {
            id: id.to_string(),
            subject: format!("Issue {id} from alice@example.com"),
            description: "Charged twice on card 4111 1111 1111 1111".to_string(),
            status: TicketStatus::Resolved,
            priority: TicketPriority::Medium,
            category: Some("billing".to_string()),
            channel: Some("email".to_string()),
            assignee_id: assignee.map(str::to_string),
            customer_id: Some("cust-1".to_string()),
            created_at: created,
            resolved_at: Some(created + Duration::hours(4)),
            satisfaction: Some(4),
            messages: vec![TicketMessage {
                author_role: crate::types::AuthorRole::Customer,
                body: "Please call me on 555-867-5309".to_string(),
                sent_at: created,
            }],
        }
    }
}
