//! Operation metrics emitted as tracing events.

use netprobe_core::{MetricsRecorder, OperationOutcome};
use std::time::Duration;
use tracing::info;

/// Records every finished operation as an `info` event on the
/// `netprobe::metrics` target, where a log pipeline can aggregate it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsRecorder for TracingMetrics {
    fn record(&self, operation: &str, outcome: OperationOutcome, elapsed: Duration) {
        info!(
            target: "netprobe::metrics",
            operation = operation,
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Operation finished"
        );
    }
}
