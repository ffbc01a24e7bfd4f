//! Flow optimizer: the cache-through façade every phase is called through
//!
//! ```text
//! caller → execute_phase(fingerprint, compute)
//!            ├─ cache hit  → { data, cache_hit: true }
//!            └─ cache miss → compute() → cache put → { data, cache_hit: false }
//! ```
//!
//! Per-entity workloads go through [`FlowOptimizer::run_batch`], which runs
//! the same check/compute/store sequence for each entity inside the batch
//! scheduler.

mod forecast;

pub use forecast::{ForecastReport, RerunOutcome};

use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::confidence;
use crate::fingerprint::{fingerprint_entities, Fingerprint, FingerprintPolicy, Fingerprintable};
use crate::pipeline::contract::validate_stored;
use crate::pipeline::{PhaseContext, PhaseError};
use crate::scheduler::{BatchConfig, BatchReport, BatchScheduler, SchedulerError};
use crate::storage::ResultCache;
use crate::types::{AnalysisKind, AnalysisPayload};

/// Tunables shared by every phase run through the optimizer
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSettings {
    pub fingerprint_policy: FingerprintPolicy,
    pub batch: BatchConfig,
    /// Tickets forwarded to discovery and targeted analysis
    pub sample_size: usize,
    /// Most recent tickets forwarded per agent forecast
    pub forecast_recent_tickets: usize,
    pub available_tools: Vec<String>,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            fingerprint_policy: FingerprintPolicy::Identity,
            batch: BatchConfig::default(),
            sample_size: 200,
            forecast_recent_tickets: 20,
            available_tools: Vec::new(),
        }
    }
}

/// Uniform phase result, whether served from cache or computed
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome<T> {
    pub data: T,
    pub cache_hit: bool,
    pub fingerprint: Fingerprint,
    pub stored_at: DateTime<Utc>,
    /// Set on cache hits
    pub served_at: Option<DateTime<Utc>>,
}

pub struct FlowOptimizer {
    cache: Arc<ResultCache>,
    ctx: PhaseContext,
    settings: FlowSettings,
    cancel: CancellationToken,
}

impl FlowOptimizer {
    pub fn new(cache: Arc<ResultCache>, ctx: PhaseContext, settings: FlowSettings) -> Self {
        Self {
            cache,
            ctx,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn context(&self) -> &PhaseContext {
        &self.ctx
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Cache key for `entities` under `mode`, honouring the fingerprint policy
    pub fn fingerprint_for<E: Fingerprintable>(&self, entities: &[E], mode: &str) -> Fingerprint {
        fingerprint_entities(entities, mode, self.settings.fingerprint_policy)
    }

    /// Serve from cache, or compute and store.
    ///
    /// Cached payloads are re-checked against their output contract; one that
    /// fails is dropped and recomputed. Failed computations are never cached.
    pub async fn execute_phase<T, F, Fut>(
        &self,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<PhaseOutcome<T>, PhaseError>
    where
        T: AnalysisPayload,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PhaseError>>,
    {
        if let Some(hit) = self.cache.get_checked(T::KIND, &fingerprint, validate_stored) {
            if let Some(data) = T::from_result(hit.payload) {
                debug!(kind = %T::KIND, key = %fingerprint, "Served from cache");
                return Ok(PhaseOutcome {
                    data,
                    cache_hit: true,
                    fingerprint,
                    stored_at: hit.stored_at,
                    served_at: Some(hit.served_at),
                });
            }
        }
        self.compute_and_store(fingerprint, compute).await
    }

    /// Always compute, then overwrite the cached entry
    pub async fn execute_phase_fresh<T, F, Fut>(
        &self,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<PhaseOutcome<T>, PhaseError>
    where
        T: AnalysisPayload,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PhaseError>>,
    {
        self.compute_and_store(fingerprint, compute).await
    }

    async fn compute_and_store<T, F, Fut>(
        &self,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<PhaseOutcome<T>, PhaseError>
    where
        T: AnalysisPayload,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PhaseError>>,
    {
        let data = compute().await?;
        let stored_at = Utc::now();
        self.cache
            .put_at(T::KIND, &fingerprint, &data.clone().into_result(), stored_at);

        Ok(PhaseOutcome {
            data,
            cache_hit: false,
            fingerprint,
            stored_at,
            served_at: None,
        })
    }

    /// Scheduler for one batch job, cancelled together with this optimizer
    pub fn scheduler(&self) -> Result<BatchScheduler, SchedulerError> {
        BatchScheduler::with_cancellation(self.settings.batch, self.cancel.child_token())
    }

    /// Drive `process` over `items` with the configured batch settings
    pub async fn run_batch<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        process: F,
    ) -> Result<BatchReport<R>, SchedulerError>
    where
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
        E: Display,
    {
        let scheduler = self.scheduler()?;
        Ok(scheduler.run_with_report(items, process).await)
    }

    pub fn should_rerun(&self, confidence: f64) -> bool {
        confidence::should_rerun(confidence)
    }

    /// Drop cached results of one kind, or all of them
    pub fn clear_cache(&self, kind: Option<AnalysisKind>) -> usize {
        self.cache.clear(kind)
    }

    /// Stop every batch job started from this optimizer
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
