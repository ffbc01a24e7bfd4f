//! Batch scheduling for per-entity inference workloads

mod batch;

pub use batch::{
    partition, run_batches, BatchConfig, BatchProgress, BatchReport, BatchScheduler, BatchState,
    SchedulerError, DEFAULT_BATCH_SIZE, DEFAULT_INTER_BATCH_DELAY, DEFAULT_MAX_CONCURRENT,
};
