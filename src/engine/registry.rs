//! Registry of groups: two namespaces, one per execution mode.
//!
//! Each namespace map has its own lock, separate from every group's sweep
//! lock. The map lock is only held long enough to look up, insert, remove,
//! or snapshot groups, so creating or deleting a group never waits on a
//! sweep and a sweep never waits on registry mutation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::config::{Config, EngineLimits};
use crate::error::{Error, Result};
use crate::model::{Mode, QueuedItem, StartGate, WorkItem};
use crate::telemetry::metrics;

use super::group::{Group, SweepOutcome, SweepStats};

/// Totals for one registry-wide pass over a namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub groups_ran: usize,
    pub groups_busy: usize,
    pub groups_gated: usize,
    /// Group sweeps that panicked and were lost.
    pub groups_failed: usize,
    pub items: SweepStats,
}

impl PassReport {
    fn record(&mut self, outcome: SweepOutcome) {
        match outcome {
            SweepOutcome::Busy => self.groups_busy += 1,
            SweepOutcome::Gated => self.groups_gated += 1,
            SweepOutcome::Ran(stats) => {
                self.groups_ran += 1;
                self.items.succeeded += stats.succeeded;
                self.items.failed += stats.failed;
                self.items.retried += stats.retried;
                self.items.dropped += stats.dropped;
                self.items.panicked += stats.panicked;
            }
        }
    }
}

struct Namespace<P> {
    mode: Mode,
    groups: RwLock<HashMap<String, Arc<Group<P>>>>,
}

impl<P: Send + Sync + 'static> Namespace<P> {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            groups: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, name: &str) -> Option<Arc<Group<P>>> {
        self.groups.read().get(name).cloned()
    }

    /// Look up under the read lock; create under the write lock only if
    /// still absent.
    fn get_or_create(&self, name: &str) -> Arc<Group<P>> {
        if let Some(group) = self.get(name) {
            return group;
        }
        let mut groups = self.groups.write();
        let group = groups.entry(name.to_string()).or_insert_with(|| {
            debug!(mode = %self.mode, group = name, "group created");
            Arc::new(Group::new(name, self.mode))
        });
        Arc::clone(group)
    }

    fn remove(&self, name: &str) -> Option<Arc<Group<P>>> {
        self.groups.write().remove(name)
    }

    fn snapshot(&self) -> Vec<Arc<Group<P>>> {
        self.groups.read().values().cloned().collect()
    }
}

/// Owns every group and the sweep interval that drives them.
pub struct Registry<P> {
    ordered: Namespace<P>,
    concurrent: Namespace<P>,
    sweep_interval: RwLock<Duration>,
    limits: EngineLimits,
}

impl<P: Send + Sync + 'static> Registry<P> {
    pub fn new(sweep_interval: Duration, limits: EngineLimits) -> Self {
        Self {
            ordered: Namespace::new(Mode::Ordered),
            concurrent: Namespace::new(Mode::Concurrent),
            sweep_interval: RwLock::new(sweep_interval),
            limits,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sweep_interval, config.limits)
    }

    fn namespace(&self, mode: Mode) -> &Namespace<P> {
        match mode {
            Mode::Ordered => &self.ordered,
            Mode::Concurrent => &self.concurrent,
        }
    }

    /// Enqueue an item at the tail of its group, creating the group if
    /// this is the first item for it. Waits while the group is being swept.
    pub async fn push(&self, item: WorkItem<P>) {
        let group = self.namespace(item.mode).get_or_create(&item.group);
        group.push(QueuedItem::from(item)).await;
    }

    /// Route an item by a raw mode tag (`"ordered"`, `"0"`, `"rand"`, ...),
    /// overriding `item.mode`. An unknown tag is reported and the item
    /// dropped.
    pub async fn push_tagged(&self, tag: &str, mut item: WorkItem<P>) -> Result<()> {
        match tag.parse::<Mode>() {
            Ok(mode) => {
                item.mode = mode;
                self.push(item).await;
                Ok(())
            }
            Err(err) => {
                self.drop_unroutable(&item.group, &err);
                Err(err)
            }
        }
    }

    /// Report an item whose execution mode could not be determined. The
    /// item is dropped: it is never enqueued and its callback never fires.
    pub fn drop_unroutable(&self, group: &str, err: &Error) {
        error!(group, error = %err, "dropping unroutable item");
        metrics::items_unroutable().add(1, &[]);
    }

    /// Set the start-gate for `name` in both namespaces, creating either
    /// group if it does not exist yet.
    pub fn set_group_start<F>(&self, name: &str, gate: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let gate: StartGate = Arc::new(gate);
        self.ordered
            .get_or_create(name)
            .set_start_gate(Arc::clone(&gate));
        self.concurrent.get_or_create(name).set_start_gate(gate);
    }

    /// Remove `name` from both namespaces. A sweep already running on the
    /// group keeps its own handle and finishes normally.
    pub fn delete_group(&self, name: &str) {
        let ordered = self.ordered.remove(name);
        let concurrent = self.concurrent.remove(name);
        if ordered.is_some() || concurrent.is_some() {
            debug!(group = name, "group deleted");
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        *self.sweep_interval.read()
    }

    /// Change the tick interval. Takes effect from the next scheduled wait.
    pub fn set_sweep_interval(&self, interval: Duration) {
        *self.sweep_interval.write() = interval;
    }

    /// Items waiting in group `name` of the given mode, if it exists.
    pub fn pending(&self, mode: Mode, name: &str) -> Option<usize> {
        self.namespace(mode).get(name).map(|group| group.pending())
    }

    /// Sweep every ordered group once.
    pub async fn sweep_ordered(&self) -> PassReport {
        self.sweep(Mode::Ordered).await
    }

    /// Sweep every concurrent group once.
    pub async fn sweep_concurrent(&self) -> PassReport {
        self.sweep(Mode::Concurrent).await
    }

    /// Sweep every group of one mode, each group in its own task, and wait
    /// for all of them.
    pub async fn sweep(&self, mode: Mode) -> PassReport {
        let groups = self.namespace(mode).snapshot();
        let mut tasks = JoinSet::new();
        for group in groups {
            let limits = self.limits;
            tasks.spawn(async move { group.sweep(&limits).await });
        }

        let mut report = PassReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(%mode, error = %e, "group sweep task failed");
                    report.groups_failed += 1;
                }
            }
        }
        report
    }

    /// Wait until no group sweep is in flight.
    pub async fn quiesce(&self) {
        let groups = self
            .ordered
            .snapshot()
            .into_iter()
            .chain(self.concurrent.snapshot());
        for group in groups {
            group.wait_idle().await;
        }
    }
}
