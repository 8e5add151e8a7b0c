//! Group execution engine: groups and their sweeps, the registry that owns
//! them, and the scheduler loop that drives the registry.

pub mod group;
pub mod registry;
pub mod scheduler;

pub use group::{Group, SweepOutcome, SweepStats};
pub use registry::{PassReport, Registry};
pub use scheduler::{Inlet, Scheduler};
