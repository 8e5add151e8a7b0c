//! # workq
//!
//! In-process grouped retry scheduler.
//!
//! Work items are pushed into named groups, each either ordered (items run
//! one by one, FIFO, failing items retried in place) or concurrent (each
//! sweep runs its snapshot of items at once, failing items retried on the
//! next sweep). A scheduler sweeps every group on a timer; start-gates pause
//! groups, retry predicates decide what gets another attempt, and callbacks
//! hear how each item ended.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod plan;
pub mod sync;
pub mod telemetry;
