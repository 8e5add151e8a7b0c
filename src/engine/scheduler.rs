//! Scheduler loop: the inlet that routes submitted items into the registry,
//! and one tick task per mode that sweeps the registry on an interval.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::model::{Mode, WorkItem};

use super::registry::Registry;

/// Producer handle for submitting work to a running [`Scheduler`].
pub struct Inlet<P> {
    tx: mpsc::Sender<WorkItem<P>>,
}

impl<P> Clone for Inlet<P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<P> Inlet<P> {
    /// Submit an item, waiting for room if the inlet is full.
    pub async fn submit(&self, item: WorkItem<P>) -> Result<()> {
        self.tx.send(item).await.map_err(|_| Error::InletClosed)
    }

    /// Submit an item, failing with [`Error::InletFull`] instead of waiting.
    pub fn try_submit(&self, item: WorkItem<P>) -> Result<()> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => Error::InletFull,
            TrySendError::Closed(_) => Error::InletClosed,
        })
    }
}

/// Background tasks driving a [`Registry`].
///
/// Dropping a `Scheduler` without calling [`Scheduler::shutdown`] detaches
/// its tasks: the inlet keeps routing until every [`Inlet`] is dropped and
/// the tick loops run for the life of the runtime.
pub struct Scheduler<P> {
    registry: Arc<Registry<P>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<P: Send + Sync + 'static> Scheduler<P> {
    /// Spawn the inlet task and both tick tasks on the current runtime.
    ///
    /// `inlet_capacity` bounds how many submitted items may wait for the
    /// inlet task; it is clamped to at least one.
    pub fn start(registry: Arc<Registry<P>>, inlet_capacity: usize) -> (Self, Inlet<P>) {
        let (tx, rx) = mpsc::channel(inlet_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(run_inlet(Arc::clone(&registry), rx, shutdown_rx.clone())),
            tokio::spawn(run_ticks(
                Arc::clone(&registry),
                Mode::Ordered,
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_ticks(
                Arc::clone(&registry),
                Mode::Concurrent,
                shutdown_rx,
            )),
        ];

        info!(
            interval_ms = registry.sweep_interval().as_millis() as u64,
            inlet_capacity, "scheduler started"
        );

        (
            Self {
                registry,
                shutdown,
                tasks,
            },
            Inlet { tx },
        )
    }

    pub fn registry(&self) -> &Arc<Registry<P>> {
        &self.registry
    }

    /// Stop the inlet and tick tasks, then wait for every in-flight sweep.
    ///
    /// Items already buffered in the inlet are still routed into their
    /// groups; they are not swept again by this scheduler.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "scheduler task failed");
            }
        }
        self.registry.quiesce().await;
        info!("scheduler stopped");
    }
}

async fn run_inlet<P: Send + Sync + 'static>(
    registry: Arc<Registry<P>>,
    mut rx: mpsc::Receiver<WorkItem<P>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            next = rx.recv() => match next {
                Some(item) => registry.push(item).await,
                None => break,
            },
        }
    }

    rx.close();
    while let Ok(item) = rx.try_recv() {
        registry.push(item).await;
    }
    debug!("inlet stopped");
}

async fn run_ticks<P: Send + Sync + 'static>(
    registry: Arc<Registry<P>>,
    mode: Mode,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut passes = JoinSet::new();
    loop {
        // Re-read every cycle so interval changes apply to the next wait.
        let interval = registry.sweep_interval();
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = tokio::time::sleep(interval) => {}
        }

        while passes.try_join_next().is_some() {}

        let registry = Arc::clone(&registry);
        passes.spawn(async move {
            let report = registry.sweep(mode).await;
            debug!(
                %mode,
                ran = report.groups_ran,
                busy = report.groups_busy,
                gated = report.groups_gated,
                succeeded = report.items.succeeded,
                failed = report.items.failed,
                retried = report.items.retried,
                "sweep pass finished"
            );
        });
    }

    while passes.join_next().await.is_some() {}
    debug!(%mode, "tick loop stopped");
}

/// Resolves once `shutdown` has been sent. If the sender is dropped first
/// this never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            if *shutdown.borrow() {
                return;
            }
            std::future::pending::<()>().await;
        }
    }
}
