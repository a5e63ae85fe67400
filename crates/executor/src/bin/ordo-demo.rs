//! ordo-demo: submit a burst of synthetic tasks and watch the executor order them.
//!
//! Each task sleeps for a pseudo-random duration and returns its own index.
//! Every `--fail-every`th task fails, to show failures stay isolated.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use ordo_executor::config::load_dotenv;
use ordo_executor::{Executor, ExecutorConfig, MemorySink, TaskError, TaskSpec};

// ── CLI ─────────────────────────────────────────────────────────────

/// Run a burst of prioritized synthetic tasks through a bounded executor.
#[derive(Parser, Debug)]
#[command(name = "ordo-demo", version, about)]
struct Cli {
    /// Maximum concurrently running tasks (default: ORDO_CONCURRENCY or host parallelism).
    #[arg(long, short = 'c')]
    concurrency: Option<usize>,

    /// Number of tasks to submit.
    #[arg(long, short = 'n', env = "ORDO_DEMO_TASKS", default_value_t = 12)]
    tasks: usize,

    /// Number of distinct priority levels (priorities are 0..levels).
    #[arg(long, default_value_t = 3)]
    levels: i32,

    /// Upper bound for each task's simulated work, in milliseconds.
    #[arg(long, default_value_t = 200)]
    max_millis: u64,

    /// Make every Nth task fail (0 = never).
    #[arg(long, default_value_t = 0)]
    fail_every: usize,

    /// Emit Queue/Starting/Done lifecycle events through tracing.
    #[arg(long)]
    logging: bool,

    /// Print final executor stats as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before the subscriber, so RUST_LOG from .env applies.
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ExecutorConfig::from_env()?;
    if let Some(limit) = cli.concurrency {
        config.concurrency = Some(limit);
    }
    config.logging |= cli.logging;

    // Start order is always recorded; tracing output is optional.
    let recorder = MemorySink::new();
    let mut builder = ordo_executor::ExecutorBuilder::from_config(config.clone());
    if !config.logging {
        builder = builder.log_sink(Arc::new(recorder.clone()));
    }
    let executor: Executor = builder.build()?;
    info!(
        executor = %executor.name(),
        concurrency = executor.concurrency(),
        tasks = cli.tasks,
        "submitting tasks"
    );

    let levels = cli.levels.max(1);
    let handles: Vec<_> = (0..cli.tasks)
        .map(|i| {
            let priority = (i as i32 * 7 + 3) % levels;
            let millis = simulated_millis(i, cli.max_millis);
            let fails = cli.fail_every > 0 && (i + 1) % cli.fail_every == 0;
            executor.submit_task(
                TaskSpec::new(move || async move {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    if fails {
                        anyhow::bail!("task {i} failed after {millis}ms");
                    }
                    Ok(i)
                })
                .name(format!("job-{i:02}"))
                .priority(priority),
            )
        })
        .collect();

    for handle in handles {
        let name = handle.name().to_string();
        let priority = handle.priority();
        match handle.await {
            Ok(value) => info!(task = %name, priority, value, "task succeeded"),
            Err(TaskError::Failed(e)) => warn!(task = %name, priority, error = %e, "task failed"),
            Err(e) => warn!(task = %name, priority, error = %e, "task did not complete"),
        }
    }

    if !config.logging {
        info!(order = ?recorder.started(), "start order");
    }

    if let Some(stats) = executor.stats().await {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            info!(
                succeeded = stats.succeeded,
                failed = stats.failed,
                avg_ms = stats.avg_task_duration.as_millis() as u64,
                "all tasks settled"
            );
        }
    }

    executor.shutdown().await;
    Ok(())
}

/// Deterministic spread of durations in `0..=max`.
fn simulated_millis(i: usize, max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    (i as u64).wrapping_mul(2_654_435_761) % (max + 1)
}
