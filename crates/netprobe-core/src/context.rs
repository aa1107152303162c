//! Shared state handed to every probe engine.

use crate::{MetricsRecorder, NoopMetrics, Resolver, SequenceCounter, TransportFactory};
use std::sync::Arc;

/// Collaborators and counters used by the engines.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ProbeContext {
    pub resolver: Arc<dyn Resolver>,
    pub transports: Arc<dyn TransportFactory>,
    pub metrics: Arc<dyn MetricsRecorder>,
    pub sequence: Arc<SequenceCounter>,
}

impl ProbeContext {
    pub fn new(resolver: Arc<dyn Resolver>, transports: Arc<dyn TransportFactory>) -> Self {
        Self {
            resolver,
            transports,
            metrics: Arc::new(NoopMetrics),
            sequence: Arc::new(SequenceCounter::for_process()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_sequence(mut self, sequence: Arc<SequenceCounter>) -> Self {
        self.sequence = sequence;
        self
    }
}

impl std::fmt::Debug for ProbeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeContext")
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
