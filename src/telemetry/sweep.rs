//! Sweep span helpers.
//!
//! Every group sweep runs inside a `workq.sweep` span so the log lines of
//! one pass over one group can be told apart from the next.

use tracing::Span;
use uuid::Uuid;

use crate::model::Mode;

/// Start a span for one sweep of one group.
///
/// `sweep.outcome` is declared empty and filled in by [`record_outcome`].
pub fn start_sweep_span(mode: Mode, group: &str) -> Span {
    tracing::info_span!(
        "workq.sweep",
        "sweep.mode" = mode.as_str(),
        "sweep.group" = group,
        "sweep.id" = %Uuid::new_v4(),
        "sweep.outcome" = tracing::field::Empty,
    )
}

/// Record how a sweep ended on its span.
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("sweep.outcome", outcome);
}
