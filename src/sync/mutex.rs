//! Exclusive lock with a non-blocking acquire path.
//!
//! Sweeps use [`NonBlockingMutex::try_lock`] to skip a group that is
//! already being swept; shutdown uses [`NonBlockingMutex::lock`] to wait
//! for an in-flight sweep to drain.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// An async mutex guarding no data, only the right to run.
#[derive(Debug, Default)]
pub struct NonBlockingMutex {
    locked: AtomicBool,
    released: Notify,
}

/// Holds a [`NonBlockingMutex`]. Dropping the guard unlocks it.
#[must_use = "the mutex is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct NonBlockingGuard<'a> {
    mutex: &'a NonBlockingMutex,
}

impl NonBlockingMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the mutex is free, then take it.
    pub async fn lock(&self) -> NonBlockingGuard<'_> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            // An unlock between the failed try_lock and this await leaves a
            // stored permit, so the wakeup is never lost.
            self.released.notified().await;
        }
    }

    /// Take the mutex if it is free. Never waits.
    pub fn try_lock(&self) -> Option<NonBlockingGuard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| NonBlockingGuard { mutex: self })
    }

    /// Whether someone currently holds the mutex.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        self.released.notify_one();
    }
}

impl Drop for NonBlockingGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
