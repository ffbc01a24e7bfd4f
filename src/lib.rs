//! Support Insights: analysis orchestration for AI-assisted support analytics
//!
//! Turns a large, untrusted ticket collection into a sequence of externally
//! computed insights while bounding cost, latency and PII exposure.
//!
//! ## Architecture
//!
//! - **Fingerprinting**: order-insensitive cache keys over ticket sets
//! - **Result Cache**: TTL cache of analysis results over a best-effort store
//! - **Batch Scheduler**: bounded-concurrency worker pool with progress and cancellation
//! - **Pipeline**: Discovery → Hypothesis → Targeted Analysis, each phase validated
//! - **Confidence Gate**: selects low-confidence forecasts for re-run
//! - **Flow Optimizer**: cache-through façade every phase is called through

pub mod confidence;
pub mod config;
pub mod fingerprint;
pub mod flow;
pub mod llm;
pub mod pipeline;
pub mod preprocess;
pub mod privacy;
pub mod scheduler;
pub mod storage;
pub mod types;

pub use config::{ConfigError, InsightsConfig};

pub use confidence::{should_rerun, ConfidenceTier, RERUN_CONFIDENCE_THRESHOLD};
pub use fingerprint::{fingerprint, Fingerprint, FingerprintPolicy};

pub use flow::{FlowOptimizer, FlowSettings, ForecastReport, PhaseOutcome, RerunOutcome};

pub use pipeline::{
    AgentWorkload, AnalysisPipeline, PhaseContext, PhaseError, PipelineError, PipelineOptions,
    PipelineRun, PipelineState,
};

pub use scheduler::{BatchConfig, BatchProgress, BatchReport, BatchScheduler, SchedulerError};

pub use storage::{CacheStore, InMemoryStore, ResultCache, SledStore};

pub use llm::{HttpInferenceBackend, InferenceBackend, InferenceRequest};
pub use privacy::{Redactor, Scrubber};

pub use types::{AnalysisKind, AnalysisResult, Ticket};
