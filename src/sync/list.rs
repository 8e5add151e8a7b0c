//! Thread-safe double-ended queue used as each group's pending work.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// A `VecDeque` behind a lock. Every method takes the lock only for the
/// duration of the call.
#[derive(Debug)]
pub struct SynchronizedList<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> Default for SynchronizedList<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> From<VecDeque<T>> for SynchronizedList<T> {
    fn from(items: VecDeque<T>) -> Self {
        Self {
            inner: Mutex::new(items),
        }
    }
}

impl<T> SynchronizedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    pub fn push_front(&self, item: T) {
        self.inner.lock().push_front(item);
    }

    pub fn pop_front(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Move every element of `other` to the end of this list, leaving
    /// `other` empty. The two locks are never held together.
    pub fn push_back_list(&self, other: &SynchronizedList<T>) {
        let moved = std::mem::take(&mut *other.inner.lock());
        if moved.is_empty() {
            return;
        }
        self.inner.lock().extend(moved);
    }

    /// Swap the contents out for an empty list in one step.
    pub fn take(&self) -> SynchronizedList<T> {
        SynchronizedList::from(std::mem::take(&mut *self.inner.lock()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
