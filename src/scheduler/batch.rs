//! Bounded-concurrency batch scheduler
//!
//! Partitions a work list into fixed-size batches and keeps at most
//! `max_concurrent` of them in flight. Runs on the calling task: batches are
//! futures in a `FuturesUnordered`, not spawned tasks, so `process` may borrow
//! from the caller.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_INTER_BATCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub max_concurrent: usize,
    /// Pause before a freed slot picks up the next queued batch
    pub inter_batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            inter_batch_delay: DEFAULT_INTER_BATCH_DELAY,
        }
    }
}

impl BatchConfig {
    pub fn new(batch_size: usize, max_concurrent: usize, inter_batch_delay: Duration) -> Self {
        Self {
            batch_size,
            max_concurrent,
            inter_batch_delay,
        }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.batch_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Progress snapshot published after every finished batch.
///
/// `completed` counts finished batches, failed ones included, so it only ever
/// grows during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn is_done(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Outcome of one scheduler run
#[derive(Debug, Clone)]
pub struct BatchReport<R> {
    pub job_id: Uuid,
    /// Successful batch outputs, concatenated in batch index order
    pub results: Vec<R>,
    pub failed_batches: Vec<usize>,
    pub total_batches: usize,
    pub batch_sizes: Vec<usize>,
    pub statuses: Vec<BatchState>,
    pub cancelled: bool,
}

impl<R> BatchReport<R> {
    fn empty(job_id: Uuid, cancelled: bool) -> Self {
        Self {
            job_id,
            results: Vec::new(),
            failed_batches: Vec::new(),
            total_batches: 0,
            batch_sizes: Vec::new(),
            statuses: Vec::new(),
            cancelled,
        }
    }

    pub fn succeeded_batches(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s == BatchState::Completed)
            .count()
    }

    /// Every batch finished and none failed
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.succeeded_batches() == self.total_batches
    }
}

/// Split `items` into ordered chunks of at most `size` (`size` must be > 0)
pub fn partition<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut batches = Vec::with_capacity(items.len().div_ceil(size.max(1)));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size.max(1)).collect());
    }
    batches
}

/// Worker pool over batches of one job.
///
/// Cancellation is permanent for a scheduler: once cancelled, no new batch
/// starts, in-flight batches are abandoned, and progress reads zero.
pub struct BatchScheduler {
    config: BatchConfig,
    cancel: CancellationToken,
    progress: watch::Sender<BatchProgress>,
}

impl BatchScheduler {
    pub fn new(config: BatchConfig) -> Result<Self, SchedulerError> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Scheduler that stops when `cancel` fires
    pub fn with_cancellation(
        config: BatchConfig,
        cancel: CancellationToken,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let (progress, _) = watch::channel(BatchProgress::default());
        Ok(Self {
            config,
            cancel,
            progress,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Progress updates for UI polling or logging
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> BatchProgress {
        *self.progress.borrow()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.progress.send_replace(BatchProgress::default());
    }

    /// Token that cancels this scheduler when triggered elsewhere
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `process` over every batch and return the successful outputs
    pub async fn run<T, R, E, F, Fut>(&self, items: Vec<T>, process: F) -> Vec<R>
    where
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
        E: Display,
    {
        self.run_with_report(items, process).await.results
    }

    pub async fn run_with_report<T, R, E, F, Fut>(&self, items: Vec<T>, process: F) -> BatchReport<R>
    where
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
        E: Display,
    {
        let job_id = Uuid::new_v4();

        if self.cancel.is_cancelled() {
            debug!(%job_id, "Scheduler already cancelled, not starting");
            self.progress.send_replace(BatchProgress::default());
            return BatchReport::empty(job_id, true);
        }
        if items.is_empty() {
            self.progress.send_replace(BatchProgress::default());
            return BatchReport::empty(job_id, false);
        }

        let item_count = items.len();
        let batches = partition(items, self.config.batch_size);
        let total = batches.len();
        let batch_sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        let mut statuses = vec![BatchState::Queued; total];

        info!(
            %job_id,
            items = item_count,
            batches = total,
            max_concurrent = self.config.max_concurrent,
            "Batch job started"
        );
        self.progress.send_replace(BatchProgress {
            completed: 0,
            failed: 0,
            total,
        });

        let process = &process;
        let delay = self.config.inter_batch_delay;
        let launch = |index: usize, batch: Vec<T>, paced: bool| async move {
            if paced && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            (index, process(batch, index).await)
        };

        let mut queue = batches.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        for (index, batch) in queue.by_ref().take(self.config.max_concurrent) {
            statuses[index] = BatchState::Running;
            in_flight.push(launch(index, batch, false));
        }

        let mut collected: Vec<(usize, Vec<R>)> = Vec::with_capacity(total);
        let mut failed_batches = Vec::new();
        let mut finished = 0usize;
        let mut cancelled = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = in_flight.next() => next,
            };
            let Some((index, outcome)) = next else {
                break;
            };

            finished += 1;
            match outcome {
                Ok(output) => {
                    statuses[index] = BatchState::Completed;
                    debug!(%job_id, batch = index, outputs = output.len(), "Batch completed");
                    collected.push((index, output));
                }
                Err(e) => {
                    statuses[index] = BatchState::Failed;
                    warn!(%job_id, batch = index, error = %e, "Batch failed, continuing with remaining batches");
                    failed_batches.push(index);
                }
            }
            self.progress.send_replace(BatchProgress {
                completed: finished,
                failed: failed_batches.len(),
                total,
            });

            if let Some((index, batch)) = queue.next() {
                statuses[index] = BatchState::Running;
                in_flight.push(launch(index, batch, true));
            }
        }

        if cancelled {
            let abandoned = in_flight.len();
            drop(in_flight);
            self.progress.send_replace(BatchProgress::default());
            info!(%job_id, finished, abandoned, total, "Batch job cancelled");
        } else {
            info!(
                %job_id,
                total,
                failed = failed_batches.len(),
                "Batch job finished"
            );
        }

        collected.sort_by_key(|(index, _)| *index);
        failed_batches.sort_unstable();
        let results = collected.into_iter().flat_map(|(_, r)| r).collect();

        BatchReport {
            job_id,
            results,
            failed_batches,
            total_batches: total,
            batch_sizes,
            statuses,
            cancelled,
        }
    }
}

/// One-shot helper: build a scheduler for `config` and run `process`
pub async fn run_batches<T, R, E, F, Fut>(
    items: Vec<T>,
    config: BatchConfig,
    process: F,
) -> Result<Vec<R>, SchedulerError>
where
    F: Fn(Vec<T>, usize) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
    E: Display,
{
    let scheduler = BatchScheduler::new(config)?;
    Ok(scheduler.run(items, process).await)
}
