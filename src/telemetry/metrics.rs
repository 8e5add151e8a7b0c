//! Metric instrument factories for workq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op and recording
//! costs next to nothing.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

use crate::model::Mode;

fn meter() -> Meter {
    opentelemetry::global::meter("workq")
}

/// Counter: group sweep attempts.
/// Labels: `mode`, `outcome` ("ran" | "busy" | "gated").
pub fn sweeps() -> Counter<u64> {
    meter()
        .u64_counter("workq.sweeps")
        .with_description("Number of group sweep attempts")
        .build()
}

/// Counter: items that reached a terminal outcome.
/// Labels: `mode`, `result` ("success" | "failure").
pub fn items_completed() -> Counter<u64> {
    meter()
        .u64_counter("workq.items.completed")
        .with_description("Number of items that reached a terminal outcome")
        .build()
}

/// Counter: failed attempts the retry predicate asked to retry.
/// Labels: `mode`.
pub fn items_retried() -> Counter<u64> {
    meter()
        .u64_counter("workq.items.retried")
        .with_description("Number of failed attempts scheduled for retry")
        .build()
}

/// Counter: items dropped because their mode could not be routed.
pub fn items_unroutable() -> Counter<u64> {
    meter()
        .u64_counter("workq.items.unroutable")
        .with_description("Items dropped for an unknown execution mode")
        .build()
}

/// Histogram: duration of one group sweep in milliseconds.
/// Labels: `mode`.
pub fn sweep_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("workq.sweep.duration_ms")
        .with_description("Duration of one group sweep")
        .with_unit("ms")
        .build()
}

pub(crate) fn mode_label(mode: Mode) -> KeyValue {
    KeyValue::new("mode", mode.as_str())
}
