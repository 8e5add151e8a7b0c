//! Core data model.
//!
//! A work item is a payload plus the three hooks the engine drives it with:
//! the action that does the work, the retry predicate consulted when the
//! action fails, and the callback told how it all ended.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Future returned by an action.
pub type ActionFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Does the work for one payload. An `Err` counts as a failed attempt.
pub type Action<P> = Arc<dyn Fn(Arc<P>) -> ActionFuture + Send + Sync>;

/// Decides whether a failed attempt should be retried.
pub type RetryPredicate<P> = Arc<dyn Fn(&P, &anyhow::Error) -> bool + Send + Sync>;

/// Receives the terminal outcome: `true` on success, `false` once retries
/// are exhausted.
pub type Callback<P> = Arc<dyn Fn(&P, bool) + Send + Sync>;

/// Checked at the start of every sweep; `false` pauses the group.
pub type StartGate = Arc<dyn Fn() -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Execution policy of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Items run one at a time in FIFO order; a failure blocks the rest.
    Ordered,
    /// Every item in a sweep's snapshot runs independently.
    Concurrent,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Ordered => "ordered",
            Mode::Concurrent => "concurrent",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ordered" | "order" | "0" => Ok(Mode::Ordered),
            "concurrent" | "rand" | "random" | "1" => Ok(Mode::Concurrent),
            _ => Err(Error::UnknownMode(s.to_string())),
        }
    }
}

impl TryFrom<i32> for Mode {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Mode::Ordered),
            1 => Ok(Mode::Concurrent),
            other => Err(Error::UnknownMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of work as submitted by a caller.
///
/// Built with [`WorkItem::new`] and the hook builder methods. Hooks left
/// unset are skipped: no action means the item is dropped when reached, no
/// retry predicate means every failure is terminal, no callback means the
/// outcome goes unreported.
pub struct WorkItem<P> {
    pub mode: Mode,
    pub group: String,
    pub payload: P,
    pub(crate) action: Option<Action<P>>,
    pub(crate) retry: Option<RetryPredicate<P>>,
    pub(crate) callback: Option<Callback<P>>,
}

impl<P: Clone> Clone for WorkItem<P> {
    fn clone(&self) -> Self {
        Self {
            mode: self.mode,
            group: self.group.clone(),
            payload: self.payload.clone(),
            action: self.action.clone(),
            retry: self.retry.clone(),
            callback: self.callback.clone(),
        }
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for WorkItem<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("mode", &self.mode)
            .field("group", &self.group)
            .field("payload", &self.payload)
            .field("action", &self.action.is_some())
            .field("retry", &self.retry.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl<P: Send + Sync + 'static> WorkItem<P> {
    pub fn new(mode: Mode, group: impl Into<String>, payload: P) -> Self {
        Self {
            mode,
            group: group.into(),
            payload,
            action: None,
            retry: None,
            callback: None,
        }
    }

    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(Arc<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.action = Some(Arc::new(move |payload: Arc<P>| -> ActionFuture {
            Box::pin(action(payload))
        }));
        self
    }

    pub fn retry<F>(mut self, retry: F) -> Self
    where
        F: Fn(&P, &anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.retry = Some(Arc::new(retry));
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&P, bool) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

// ---------------------------------------------------------------------------
// Queued Item
// ---------------------------------------------------------------------------

/// A work item as held in a group's queue. Owns its payload independently
/// of the [`WorkItem`] it was copied from.
pub struct QueuedItem<P> {
    payload: Arc<P>,
    action: Option<Action<P>>,
    retry: Option<RetryPredicate<P>>,
    callback: Option<Callback<P>>,
}

impl<P> From<WorkItem<P>> for QueuedItem<P> {
    fn from(item: WorkItem<P>) -> Self {
        Self {
            payload: Arc::new(item.payload),
            action: item.action,
            retry: item.retry,
            callback: item.callback,
        }
    }
}

impl<P> QueuedItem<P> {
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Run the action once. `None` when the item has no action.
    pub(crate) async fn attempt(&self) -> Option<anyhow::Result<()>> {
        let action = self.action.as_ref()?;
        Some(action(Arc::clone(&self.payload)).await)
    }

    /// Ask the retry predicate about a failure. No predicate means no retry.
    pub(crate) fn should_retry(&self, err: &anyhow::Error) -> bool {
        self.retry
            .as_ref()
            .is_some_and(|retry| retry(self.payload.as_ref(), err))
    }

    /// Report the terminal outcome.
    pub(crate) fn finish(&self, succeeded: bool) {
        if let Some(callback) = &self.callback {
            callback(self.payload.as_ref(), succeeded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_names_and_codes() {
        assert_eq!("ordered".parse::<Mode>().unwrap(), Mode::Ordered);
        assert_eq!("Order".parse::<Mode>().unwrap(), Mode::Ordered);
        assert_eq!("concurrent".parse::<Mode>().unwrap(), Mode::Concurrent);
        assert_eq!("rand".parse::<Mode>().unwrap(), Mode::Concurrent);
        assert_eq!(Mode::try_from(0).unwrap(), Mode::Ordered);
        assert_eq!(Mode::try_from(1).unwrap(), Mode::Concurrent);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(matches!(
            "sideways".parse::<Mode>(),
            Err(Error::UnknownMode(m)) if m == "sideways"
        ));
        assert!(matches!(Mode::try_from(7), Err(Error::UnknownMode(_))));
    }

    #[tokio::test]
    async fn queued_item_without_hooks_is_inert() {
        let item: QueuedItem<u32> = WorkItem::new(Mode::Ordered, "g", 1).into();
        assert!(item.attempt().await.is_none());
        assert!(!item.should_retry(&anyhow::anyhow!("boom")));
        item.finish(true);
        assert_eq!(*item.payload(), 1);
    }

    #[tokio::test]
    async fn queued_item_drives_hooks() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let reported = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&reported);
        let item: QueuedItem<u32> = WorkItem::new(Mode::Concurrent, "g", 7)
            .action(|p| async move {
                anyhow::ensure!(*p == 7, "wrong payload");
                Ok(())
            })
            .retry(|p, _| *p > 5)
            .callback(move |_, ok| seen.store(ok, Ordering::SeqCst))
            .into();

        assert!(item.attempt().await.unwrap().is_ok());
        assert!(item.should_retry(&anyhow::anyhow!("boom")));
        item.finish(true);
        assert!(reported.load(Ordering::SeqCst));
    }
}
