//! workq CLI: run a job plan through the grouped retry scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use workq::config::Config;
use workq::engine::{Registry, Scheduler};
use workq::plan::{JobReport, Plan};
use workq::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "workq", about = "Grouped retry scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a job plan until every job finishes or the timeout expires
    Run {
        /// TOML plan describing gates and jobs
        plan: PathBuf,
        /// Sweep interval in milliseconds (overrides WORKQ_SWEEP_INTERVAL_MS)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Concurrency bound per concurrent sweep (overrides WORKQ_MAX_CONCURRENCY)
        #[arg(long)]
        max_concurrency: Option<usize>,
        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Validate a job plan without running it
    Check {
        /// TOML plan describing gates and jobs
        plan: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            plan,
            interval_ms,
            max_concurrency,
            timeout_secs,
        } => cmd_run(&plan, interval_ms, max_concurrency, timeout_secs).await,
        Command::Check { plan } => cmd_check(&plan),
    }
}

async fn cmd_run(
    plan_path: &Path,
    interval_ms: Option<u64>,
    max_concurrency: Option<usize>,
    timeout_secs: u64,
) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(ms) = interval_ms {
        anyhow::ensure!(ms > 0, "--interval-ms must be greater than zero");
        config.sweep_interval = Duration::from_millis(ms);
    }
    if let Some(n) = max_concurrency {
        anyhow::ensure!(n > 0, "--max-concurrency must be greater than zero");
        config.limits.max_concurrency = Some(n);
    }

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "workq".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let plan = Plan::load(plan_path)?;
    let registry = Arc::new(Registry::<String>::from_config(&config));
    plan.install_gates(&*registry, Instant::now());

    let (scheduler, inlet) = Scheduler::start(Arc::clone(&registry), config.inlet_capacity);

    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();
    let prepared = plan.prepare(&reports_tx);
    drop(reports_tx);

    for (job, err) in &prepared.rejected {
        registry.drop_unroutable(&job.group, err);
    }

    let expected = prepared.items.len();
    info!(
        jobs = expected,
        rejected = prepared.rejected.len(),
        "submitting plan"
    );
    for item in prepared.items {
        inlet.submit(item).await?;
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    let mut reports: Vec<JobReport> = Vec::with_capacity(expected);
    while reports.len() < expected {
        match tokio::time::timeout_at(deadline, reports_rx.recv()).await {
            Ok(Some(report)) => {
                print_report(&report);
                reports.push(report);
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    finished = reports.len(),
                    expected, "timed out waiting for jobs"
                );
                break;
            }
        }
    }

    scheduler.shutdown().await;

    let succeeded = reports.iter().filter(|r| r.succeeded).count();
    println!(
        "\n{} job(s): {} succeeded, {} failed, {} unfinished, {} unroutable",
        expected + prepared.rejected.len(),
        succeeded,
        reports.len() - succeeded,
        expected - reports.len(),
        prepared.rejected.len(),
    );
    Ok(())
}

fn print_report(report: &JobReport) {
    println!(
        "{:<10}  {:<16}  {:<24}  {:<7}  attempts={}",
        report.mode,
        report.group,
        report.payload,
        if report.succeeded { "ok" } else { "failed" },
        report.attempts,
    );
}

fn cmd_check(plan_path: &Path) -> anyhow::Result<()> {
    let plan = Plan::load(plan_path)?;
    let (reports_tx, _reports_rx) = mpsc::unbounded_channel();
    let prepared = plan.prepare(&reports_tx);

    println!(
        "{} gate(s), {} job(s)",
        plan.gates.len(),
        plan.jobs.len()
    );
    for (job, err) in &prepared.rejected {
        println!("  {} / {}: {err}", job.group, job.payload);
    }

    if !prepared.rejected.is_empty() {
        anyhow::bail!("{} job(s) cannot be routed", prepared.rejected.len());
    }
    println!("plan OK");
    Ok(())
}
