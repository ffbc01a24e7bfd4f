//! insights - support analytics orchestration CLI
//!
//! # Usage
//!
//! ```bash
//! # Discovery → Hypothesis → Targeted Analysis over a ticket export
//! insights analyze --tickets tickets.json --context context.json
//!
//! # Per-agent forecasts, re-running the low-confidence ones
//! insights forecast --tickets tickets.json --roster agents.json --rerun-low-confidence
//!
//! # Force a refresh of one analysis kind
//! insights clear-cache --kind discovery
//! ```
//!
//! # Environment Variables
//!
//! - `INSIGHTS_CONFIG`: Path to the TOML config (default: ./insights.toml)
//! - `INSIGHTS_API_KEY`: Bearer token for the inference endpoint
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use support_insights::pipeline::group_by_agent;
use support_insights::storage::CacheStore;
use support_insights::types::BusinessContext;
use support_insights::{
    AnalysisKind, AnalysisPipeline, BatchScheduler, FlowOptimizer, HttpInferenceBackend,
    InMemoryStore, InsightsConfig, PhaseContext, PipelineOptions, Redactor, ResultCache,
    SledStore, Ticket,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "insights")]
#[command(about = "AI-assisted customer-support insight orchestration")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config (overrides INSIGHTS_CONFIG and ./insights.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of the persistent result cache (overrides cache.path)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Keep the result cache in memory only
    #[arg(long, global = true)]
    in_memory: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the three-phase analysis pipeline over a ticket export
    Analyze {
        /// JSON array of tickets
        #[arg(long)]
        tickets: PathBuf,
        /// Override discovery.sample_size
        #[arg(long)]
        sample_size: Option<usize>,
        /// JSON business context (priorities, constraints, goals)
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Forecast workload and satisfaction per agent
    Forecast {
        /// JSON array of tickets
        #[arg(long)]
        tickets: PathBuf,
        /// JSON array of agent IDs; agents without tickets are reported as skipped
        #[arg(long)]
        roster: Option<PathBuf>,
        /// Re-run agents whose forecast confidence is below the threshold
        #[arg(long)]
        rerun_low_confidence: bool,
    },

    /// Drop cached results of one kind, or everything
    ClearCache {
        /// discovery, hypothesis, targeted_analysis or agent_forecast
        #[arg(long)]
        kind: Option<AnalysisKind>,
    },

    /// Drop expired cache entries
    Purge,
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<InsightsConfig> {
    match path {
        Some(p) => InsightsConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(InsightsConfig::load()),
    }
}

/// Persistent cache when possible; an unavailable store degrades to memory.
fn open_cache(config: &InsightsConfig, args: &CliArgs) -> ResultCache {
    let store: Arc<dyn CacheStore> = if args.in_memory {
        Arc::new(InMemoryStore::new())
    } else {
        let path = args.cache_dir.as_ref().unwrap_or(&config.cache.path);
        match SledStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Result cache unavailable, falling back to in-memory");
                Arc::new(InMemoryStore::new())
            }
        }
    };
    ResultCache::new(store, config.ttl())
}

fn build_flow(config: &InsightsConfig, cache: ResultCache) -> Result<Arc<FlowOptimizer>> {
    let api_key = std::env::var("INSIGHTS_API_KEY")
        .ok()
        .or_else(|| config.inference.api_key.clone());
    let backend = HttpInferenceBackend::new(
        &config.inference.endpoint,
        config.inference_timeout(),
        api_key,
    )?;
    let redactor = Redactor::with_default_scrubber(config.discovery.max_text_chars)
        .context("Failed to build PII scrubber")?;
    let ctx = PhaseContext::new(
        Arc::new(backend),
        redactor,
        config.discovery.max_messages_per_ticket,
    );
    Ok(Arc::new(FlowOptimizer::new(
        Arc::new(cache),
        ctx,
        config.flow_settings(),
    )))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {what} in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel all batch work on Ctrl+C
fn spawn_shutdown_listener(flow: &Arc<FlowOptimizer>) -> JoinHandle<()> {
    let token = flow.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling outstanding batches...");
            token.cancel();
        }
    })
}

/// Log scheduler progress until the job finishes
fn spawn_progress_logger(scheduler: &BatchScheduler) -> JoinHandle<()> {
    let mut rx = scheduler.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = *rx.borrow_and_update();
            if progress.total > 0 {
                info!(
                    completed = progress.completed,
                    failed = progress.failed,
                    total = progress.total,
                    "Forecast batches"
                );
            }
            if progress.is_done() {
                break;
            }
        }
    })
}

// ============================================================================
// Commands
// ============================================================================

async fn analyze(
    flow: Arc<FlowOptimizer>,
    tickets: &Path,
    sample_size: Option<usize>,
    context: Option<&Path>,
) -> Result<()> {
    let tickets: Vec<Ticket> = read_json(tickets, "tickets")?;
    let business_context = match context {
        Some(p) => read_json(p, "business context")?,
        None => BusinessContext::default(),
    };
    info!(tickets = tickets.len(), "Starting analysis");

    let pipeline = AnalysisPipeline::new(flow);
    let options = PipelineOptions {
        sample_size,
        business_context,
        ..PipelineOptions::default()
    };
    let run = pipeline
        .run(&tickets, &options)
        .await
        .context("Analysis pipeline failed")?;
    print_json(&run)
}

async fn forecast(
    flow: Arc<FlowOptimizer>,
    tickets: &Path,
    roster: Option<&Path>,
    rerun_low_confidence: bool,
) -> Result<()> {
    let tickets: Vec<Ticket> = read_json(tickets, "tickets")?;
    let roster: Vec<String> = match roster {
        Some(p) => read_json(p, "agent roster")?,
        None => Vec::new(),
    };
    let workloads = group_by_agent(&tickets, &roster);
    info!(agents = workloads.len(), tickets = tickets.len(), "Starting forecasts");

    let scheduler = flow.scheduler()?;
    let progress = spawn_progress_logger(&scheduler);
    let report = flow.forecast_agents_with(&scheduler, &workloads).await;
    progress.abort();

    if report.cancelled {
        warn!("Forecasting cancelled; partial results follow");
    }

    if rerun_low_confidence && !report.cancelled {
        let outcome = flow
            .rerun_low_confidence(&report.forecasts, &workloads)
            .await?;
        return print_json(&outcome);
    }
    print_json(&report)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(args.config.as_deref())?;
    let cache = open_cache(&config, &args);
    info!(
        backend = cache.backend_name(),
        batch_size = config.scheduler.batch_size,
        max_concurrent = config.scheduler.max_concurrent,
        "Configuration loaded"
    );

    match &args.command {
        SubCommand::ClearCache { kind } => {
            let removed = cache.clear(*kind);
            info!(removed, kind = ?kind, "Cache cleared");
        }
        SubCommand::Purge => {
            let removed = cache.purge_expired();
            info!(removed, "Expired cache entries purged");
        }
        SubCommand::Analyze {
            tickets,
            sample_size,
            context,
        } => {
            let flow = build_flow(&config, cache)?;
            let shutdown = spawn_shutdown_listener(&flow);
            let result = analyze(flow.clone(), tickets, *sample_size, context.as_deref()).await;
            shutdown.abort();
            log_cache_stats(&flow);
            result?;
        }
        SubCommand::Forecast {
            tickets,
            roster,
            rerun_low_confidence,
        } => {
            let flow = build_flow(&config, cache)?;
            let shutdown = spawn_shutdown_listener(&flow);
            let result = forecast(flow.clone(), tickets, roster.as_deref(), *rerun_low_confidence).await;
            shutdown.abort();
            log_cache_stats(&flow);
            result?;
        }
    }

    Ok(())
}

fn log_cache_stats(flow: &FlowOptimizer) {
    let stats = flow.cache().stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        writes = stats.writes,
        expired = stats.expired_evictions,
        backend_errors = stats.backend_errors,
        "Result cache statistics"
    );
}
