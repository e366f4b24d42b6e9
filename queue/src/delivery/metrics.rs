use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};

/// Metrics for the [`Queue`](super::Queue).
#[derive(Default)]
pub struct Metrics {
    /// Number of items put
    pub puts: Counter,
    /// Number of items handed to consumers (including redeliveries)
    pub deliveries: Counter,
    /// Number of deliveries acknowledged
    pub acknowledgements: Counter,
    /// Number of deliveries that passed their deadline
    pub expirations: Counter,
    /// Number of deliveries awaiting acknowledgement
    pub pending: Gauge,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Metrics::default();
        context.register("puts", "Number of items put", metrics.puts.clone());
        context.register(
            "deliveries",
            "Number of items handed to consumers",
            metrics.deliveries.clone(),
        );
        context.register(
            "acknowledgements",
            "Number of deliveries acknowledged",
            metrics.acknowledgements.clone(),
        );
        context.register(
            "expirations",
            "Number of deliveries that passed their deadline",
            metrics.expirations.clone(),
        );
        context.register(
            "pending",
            "Number of deliveries awaiting acknowledgement",
            metrics.pending.clone(),
        );
        metrics
    }
}
