//! Integration tests for telemetry initialization and span helpers.

use workq::model::Mode;

#[test]
fn telemetry_initializes_without_endpoint() {
    // Only one global subscriber per process: try_init() may report that
    // another test installed one first, which is fine.
    let config = workq::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "workq-test".to_string(),
        default_filter: "debug".to_string(),
    };
    if let Ok(guard) = workq::telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn sweep_span_creates_and_records_outcome() {
    let span = workq::telemetry::sweep::start_sweep_span(Mode::Ordered, "billing");
    workq::telemetry::sweep::record_outcome(&span, "ran");
}

#[test]
fn metric_instruments_build_without_provider() {
    workq::telemetry::metrics::sweeps().add(1, &[]);
    workq::telemetry::metrics::items_unroutable().add(1, &[]);
    workq::telemetry::metrics::sweep_duration_ms().record(1.5, &[]);
}
