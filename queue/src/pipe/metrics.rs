use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};

/// Metrics for the [`Pipe`](super::Pipe).
#[derive(Clone, Default)]
pub struct Metrics {
    /// Number of values accepted but not yet received
    pub buffered: Gauge,
    /// Capacity of the ring held by the pump
    pub capacity: Gauge,
    /// Number of values overwritten by a covering ring
    pub evicted: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Metrics::default();
        context.register(
            "buffered",
            "Number of values accepted but not yet received",
            metrics.buffered.clone(),
        );
        context.register(
            "capacity",
            "Capacity of the ring held by the pump",
            metrics.capacity.clone(),
        );
        context.register(
            "evicted",
            "Number of values overwritten by a covering ring",
            metrics.evicted.clone(),
        );
        metrics
    }
}
