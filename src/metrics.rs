//! Latency observations for each intercepted call.

use std::fmt;
use std::time::Duration;

use crate::error::DriverError;

/// Receives one observation per intercepted driver call.
///
/// Aggregation and export belong to the implementation.
pub trait MetricsSink: Send + Sync {
    fn record(&self, method: &'static str, latency: Duration, error: Option<&DriverError>);
}

impl fmt::Debug for dyn MetricsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MetricsSink")
    }
}

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _method: &'static str, _latency: Duration, _error: Option<&DriverError>) {}
}

/// Emits each observation as a DEBUG event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMetrics;

impl MetricsSink for LoggingMetrics {
    fn record(&self, method: &'static str, latency: Duration, error: Option<&DriverError>) {
        let latency_ms = latency.as_secs_f64() * 1e3;
        match error {
            None => tracing::debug!(
                target: "sql_driver_tracing::metrics",
                method,
                latency_ms,
                status = "OK",
                "Driver call recorded"
            ),
            Some(err) => tracing::debug!(
                target: "sql_driver_tracing::metrics",
                method,
                latency_ms,
                status = "ERROR",
                error = %err,
                "Driver call recorded"
            ),
        }
    }
}
