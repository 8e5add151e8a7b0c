use std::time::Duration;

use workq::config::{Config, DEFAULT_INLET_CAPACITY, DEFAULT_SWEEP_INTERVAL};

const VARS: [&str; 4] = [
    "WORKQ_SWEEP_INTERVAL_MS",
    "WORKQ_INLET_CAPACITY",
    "WORKQ_MAX_CONCURRENCY",
    "WORKQ_MAX_IMMEDIATE_RETRIES",
];

fn clear_vars() {
    for var in VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

// One test function: the environment is process-wide and tests run in
// parallel threads.
#[test]
fn config_from_env() {
    clear_vars();

    let config = Config::from_env().unwrap();
    assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
    assert_eq!(config.inlet_capacity, DEFAULT_INLET_CAPACITY);
    assert_eq!(config.limits.max_concurrency, None);
    assert_eq!(config.limits.max_immediate_retries, None);
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("WORKQ_SWEEP_INTERVAL_MS", "250");
        std::env::set_var("WORKQ_INLET_CAPACITY", "32");
        std::env::set_var("WORKQ_MAX_CONCURRENCY", "8");
        std::env::set_var("WORKQ_MAX_IMMEDIATE_RETRIES", "5");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.sweep_interval, Duration::from_millis(250));
    assert_eq!(config.inlet_capacity, 32);
    assert_eq!(config.limits.max_concurrency, Some(8));
    assert_eq!(config.limits.max_immediate_retries, Some(5));

    unsafe {
        std::env::set_var("WORKQ_SWEEP_INTERVAL_MS", "soon");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("WORKQ_SWEEP_INTERVAL_MS", "0");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("WORKQ_SWEEP_INTERVAL_MS", "250");
        std::env::set_var("WORKQ_INLET_CAPACITY", "0");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("WORKQ_INLET_CAPACITY", "32");
        std::env::set_var("WORKQ_MAX_CONCURRENCY", "0");
    }
    assert!(Config::from_env().is_err());

    clear_vars();
}
