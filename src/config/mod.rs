//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if a value is present but malformed.
//! Every variable is optional; unset means the default.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_INLET_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub sweep_interval: Duration,
    pub inlet_capacity: usize,
    pub limits: EngineLimits,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

/// Knobs bounding how much work a single sweep may do.
///
/// Both default to `None`, which keeps the unbounded behavior: concurrent
/// sweeps launch every item at once and ordered sweeps retry a failing item
/// in place for as long as its predicate asks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum actions running at once within one concurrent sweep.
    pub max_concurrency: Option<usize>,
    /// Maximum back-to-back retries of one item within one ordered sweep.
    /// Past the cap the item waits at the head of the queue for the next tick.
    pub max_immediate_retries: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            inlet_capacity: DEFAULT_INLET_CAPACITY,
            limits: EngineLimits::default(),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sweep_interval = optional_var::<u64>("WORKQ_SWEEP_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.sweep_interval);
        if sweep_interval.is_zero() {
            return Err(Error::Config(
                "WORKQ_SWEEP_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let inlet_capacity =
            optional_var::<usize>("WORKQ_INLET_CAPACITY")?.unwrap_or(defaults.inlet_capacity);
        if inlet_capacity == 0 {
            return Err(Error::Config(
                "WORKQ_INLET_CAPACITY must be greater than zero".to_string(),
            ));
        }

        let max_concurrency = optional_var::<usize>("WORKQ_MAX_CONCURRENCY")?;
        if max_concurrency == Some(0) {
            return Err(Error::Config(
                "WORKQ_MAX_CONCURRENCY must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            sweep_interval,
            inlet_capacity,
            limits: EngineLimits {
                max_concurrency,
                max_immediate_retries: optional_var("WORKQ_MAX_IMMEDIATE_RETRIES")?,
            },
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
