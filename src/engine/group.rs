//! A named queue of work plus the two algorithms that drain it.
//!
//! The group's [`NonBlockingMutex`] is held for the whole of a sweep, so two
//! sweeps of one group never overlap: the second simply reports
//! [`SweepOutcome::Busy`]. Pushes take the same lock, so the queue only
//! changes under it and an item pushed mid-sweep waits for the next sweep.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, error, warn};

use crate::config::EngineLimits;
use crate::model::{Mode, QueuedItem, StartGate};
use crate::sync::{NonBlockingMutex, SynchronizedList};
use crate::telemetry::{metrics, sweep as sweep_span};

/// How one sweep attempt of a group ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep of this group was in progress; nothing was done.
    Busy,
    /// The start-gate returned `false`; nothing was done.
    Gated,
    /// The sweep ran.
    Ran(SweepStats),
}

/// What a sweep that ran did to its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Items whose action succeeded (callback fired with `true`).
    pub succeeded: usize,
    /// Items that failed without retry (callback fired with `false`).
    pub failed: usize,
    /// Failed attempts the retry predicate sent back to the queue.
    pub retried: usize,
    /// Items discarded because they had no action.
    pub dropped: usize,
    /// Items lost to a panicking action.
    pub panicked: usize,
}

/// Result of running one item in a concurrent sweep.
enum Attempt<P> {
    Succeeded,
    Failed,
    Dropped,
    Retry(QueuedItem<P>),
}

pub struct Group<P> {
    name: String,
    mode: Mode,
    start_gate: RwLock<Option<StartGate>>,
    queue: SynchronizedList<QueuedItem<P>>,
    lock: NonBlockingMutex,
}

impl<P> std::fmt::Debug for Group<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("pending", &self.queue.len())
            .field("sweeping", &self.lock.is_locked())
            .finish()
    }
}

impl<P: Send + Sync + 'static> Group<P> {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            start_gate: RwLock::new(None),
            queue: SynchronizedList::new(),
            lock: NonBlockingMutex::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Append an item to the tail of the queue once no sweep holds the
    /// group. Awaiting this from one of the group's own actions deadlocks;
    /// spawn the push instead.
    pub async fn push(&self, item: QueuedItem<P>) {
        let _guard = self.lock.lock().await;
        self.queue.push_back(item);
    }

    pub fn set_start_gate(&self, gate: StartGate) {
        *self.start_gate.write() = Some(gate);
    }

    /// Number of items waiting for a sweep.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_sweeping(&self) -> bool {
        self.lock.is_locked()
    }

    /// Wait for an in-flight sweep, if any, to finish.
    pub async fn wait_idle(&self) {
        let _guard = self.lock.lock().await;
    }

    fn gate_open(&self) -> bool {
        let gate = self.start_gate.read().clone();
        gate.is_none_or(|gate| gate())
    }

    /// Sweep with the algorithm matching this group's mode, inside a
    /// `workq.sweep` span, recording sweep metrics.
    pub async fn sweep(&self, limits: &EngineLimits) -> SweepOutcome {
        let span = sweep_span::start_sweep_span(self.mode, &self.name);
        let started = Instant::now();

        let outcome = match self.mode {
            Mode::Ordered => self.sweep_ordered(limits).instrument(span.clone()).await,
            Mode::Concurrent => self.sweep_concurrent(limits).instrument(span.clone()).await,
        };

        let mode = metrics::mode_label(self.mode);
        let label = match outcome {
            SweepOutcome::Busy => "busy",
            SweepOutcome::Gated => "gated",
            SweepOutcome::Ran(stats) => {
                metrics::sweep_duration_ms().record(
                    started.elapsed().as_secs_f64() * 1000.0,
                    std::slice::from_ref(&mode),
                );
                record_item_metrics(&mode, &stats);
                "ran"
            }
        };
        sweep_span::record_outcome(&span, label);
        metrics::sweeps().add(1, &[mode, KeyValue::new("outcome", label)]);
        outcome
    }

    /// Drain the queue front to back, one item at a time.
    ///
    /// A failing item the predicate wants retried goes back to the head and
    /// runs again at once. A failing item it gives up on ends the sweep;
    /// everything behind it waits for the next one.
    pub async fn sweep_ordered(&self, limits: &EngineLimits) -> SweepOutcome {
        let Some(_guard) = self.lock.try_lock() else {
            return SweepOutcome::Busy;
        };
        if !self.gate_open() {
            return SweepOutcome::Gated;
        }

        let mut stats = SweepStats::default();
        let mut immediate_retries: u32 = 0;

        while let Some(item) = self.queue.pop_front() {
            let Some(result) = item.attempt().await else {
                debug!(group = %self.name, "dropping item without an action");
                stats.dropped += 1;
                continue;
            };

            match result {
                Ok(()) => {
                    item.finish(true);
                    stats.succeeded += 1;
                    immediate_retries = 0;
                }
                Err(err) if item.should_retry(&err) => {
                    debug!(group = %self.name, error = %err, "retrying in place");
                    stats.retried += 1;
                    self.queue.push_front(item);
                    immediate_retries += 1;
                    if limits
                        .max_immediate_retries
                        .is_some_and(|cap| immediate_retries > cap)
                    {
                        debug!(
                            group = %self.name,
                            retries = immediate_retries - 1,
                            "immediate retry cap reached, deferring to next sweep"
                        );
                        break;
                    }
                }
                Err(err) => {
                    warn!(group = %self.name, error = %err, "item failed, not retrying");
                    item.finish(false);
                    stats.failed += 1;
                    break;
                }
            }
        }

        SweepOutcome::Ran(stats)
    }

    /// Run a snapshot of the queue all at once.
    ///
    /// Items pushed while the sweep runs wait for the lock and are left for
    /// the next sweep. Failures the predicate wants retried are appended back
    /// to the live queue only after every launched item has finished.
    pub async fn sweep_concurrent(&self, limits: &EngineLimits) -> SweepOutcome {
        let Some(_guard) = self.lock.try_lock() else {
            return SweepOutcome::Busy;
        };
        if !self.gate_open() {
            return SweepOutcome::Gated;
        }

        let run_queue = self.queue.take();
        let fail_queue = SynchronizedList::new();
        let permits = limits.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut tasks = JoinSet::new();

        while let Some(item) = run_queue.pop_front() {
            // The semaphore is local to this sweep and never closed.
            let permit = match &permits {
                Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
                None => None,
            };
            tasks.spawn(
                async move {
                    let _permit = permit;
                    run_once(item).await
                }
                .instrument(Span::current()),
            );
        }

        let mut stats = SweepStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Attempt::Succeeded) => stats.succeeded += 1,
                Ok(Attempt::Failed) => stats.failed += 1,
                Ok(Attempt::Dropped) => stats.dropped += 1,
                Ok(Attempt::Retry(item)) => {
                    stats.retried += 1;
                    fail_queue.push_back(item);
                }
                Err(e) => {
                    error!(group = %self.name, error = %e, "item task failed, item lost");
                    stats.panicked += 1;
                }
            }
        }

        self.queue.push_back_list(&fail_queue);
        SweepOutcome::Ran(stats)
    }
}

async fn run_once<P>(item: QueuedItem<P>) -> Attempt<P> {
    match item.attempt().await {
        None => Attempt::Dropped,
        Some(Ok(())) => {
            item.finish(true);
            Attempt::Succeeded
        }
        Some(Err(err)) if item.should_retry(&err) => {
            debug!(error = %err, "retrying next sweep");
            Attempt::Retry(item)
        }
        Some(Err(err)) => {
            warn!(error = %err, "item failed, not retrying");
            item.finish(false);
            Attempt::Failed
        }
    }
}

fn record_item_metrics(mode: &KeyValue, stats: &SweepStats) {
    let completed = metrics::items_completed();
    if stats.succeeded > 0 {
        completed.add(
            stats.succeeded as u64,
            &[mode.clone(), KeyValue::new("result", "success")],
        );
    }
    if stats.failed > 0 {
        completed.add(
            stats.failed as u64,
            &[mode.clone(), KeyValue::new("result", "failure")],
        );
    }
    if stats.retried > 0 {
        metrics::items_retried().add(stats.retried as u64, std::slice::from_ref(mode));
    }
}
