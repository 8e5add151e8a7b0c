//! Job plans: a TOML description of groups, gates and simulated jobs that
//! the `workq` CLI feeds through the engine.
//!
//! ```toml
//! [[gate]]
//! group = "billing"
//! open_after_ms = 1500
//!
//! [[job]]
//! mode = "ordered"
//! group = "billing"
//! payload = "invoice-1"
//! failures = 2
//! max_retries = 3
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::engine::Registry;
use crate::error::{Error, Result};
use crate::model::{Mode, WorkItem};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Plan {
    #[serde(default, rename = "gate")]
    pub gates: Vec<GateSpec>,
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobSpec>,
}

/// Keeps a group paused until some time after the plan starts.
#[derive(Debug, Clone, Deserialize)]
pub struct GateSpec {
    pub group: String,
    #[serde(default)]
    pub open_after_ms: u64,
}

/// A simulated job: fails `failures` times, then succeeds.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    /// Kept as written so unknown modes surface at submission, not parse.
    pub mode: String,
    pub group: String,
    pub payload: String,
    #[serde(default)]
    pub failures: u32,
    /// Failed attempts retried before the job is given up on.
    #[serde(default)]
    pub max_retries: u32,
}

/// Terminal outcome of one job, sent from its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub mode: Mode,
    pub group: String,
    pub payload: String,
    pub succeeded: bool,
    pub attempts: u32,
}

/// A plan turned into work items, plus the jobs that could not be routed.
pub struct PreparedPlan {
    pub items: Vec<WorkItem<String>>,
    pub rejected: Vec<(JobSpec, Error)>,
}

impl Plan {
    /// Load a plan from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Plan(format!("cannot read plan {}: {e}", path.display()))
        })?;
        parse(&content).map_err(|e| Error::Plan(format!("bad plan {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        parse(content).map_err(Error::Plan)
    }

    /// Install every gate on the registry, measured from `started`.
    pub fn install_gates<P: Send + Sync + 'static>(
        &self,
        registry: &Registry<P>,
        started: Instant,
    ) {
        for gate in &self.gates {
            let delay = Duration::from_millis(gate.open_after_ms);
            registry.set_group_start(&gate.group, move || started.elapsed() >= delay);
        }
    }

    /// Build a work item for every job whose mode parses.
    pub fn prepare(&self, reports: &mpsc::UnboundedSender<JobReport>) -> PreparedPlan {
        let mut items = Vec::with_capacity(self.jobs.len());
        let mut rejected = Vec::new();
        for job in &self.jobs {
            match job.mode.parse::<Mode>() {
                Ok(mode) => items.push(job.work_item(mode, reports.clone())),
                Err(e) => rejected.push((job.clone(), e)),
            }
        }
        PreparedPlan { items, rejected }
    }
}

fn parse(content: &str) -> std::result::Result<Plan, String> {
    let plan: Plan = toml::from_str(content).map_err(|e| e.to_string())?;
    if let Some(job) = plan.jobs.iter().find(|job| job.group.trim().is_empty()) {
        return Err(format!("job {:?} has an empty group name", job.payload));
    }
    Ok(plan)
}

impl JobSpec {
    pub fn work_item(
        &self,
        mode: Mode,
        reports: mpsc::UnboundedSender<JobReport>,
    ) -> WorkItem<String> {
        let attempts = Arc::new(AtomicU32::new(0));
        let failures = self.failures;
        let max_retries = self.max_retries;
        let group = self.group.clone();

        let counted = Arc::clone(&attempts);
        let seen = Arc::clone(&attempts);
        WorkItem::new(mode, self.group.clone(), self.payload.clone())
            .action(move |_| {
                let attempt = counted.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt <= failures {
                        anyhow::bail!("simulated failure {attempt}/{failures}");
                    }
                    Ok(())
                }
            })
            .retry(move |_, _| seen.load(Ordering::SeqCst) <= max_retries)
            .callback(move |payload, succeeded| {
                let _ = reports.send(JobReport {
                    mode,
                    group: group.clone(),
                    payload: payload.clone(),
                    succeeded,
                    attempts: attempts.load(Ordering::SeqCst),
                });
            })
    }
}
