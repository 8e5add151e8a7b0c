//! Synchronization primitives used by the group engine.

pub mod list;
pub mod mutex;

pub use list::SynchronizedList;
pub use mutex::{NonBlockingGuard, NonBlockingMutex};
