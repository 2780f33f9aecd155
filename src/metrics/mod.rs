//! Metrics collection for observability

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Prediction requests
    pub prediction_requests: CounterVec,
    pub prediction_duration: Histogram,
    pub validation_failures: Counter,

    // Scoring process
    pub scoring_process_duration: HistogramVec,

    // Conversation enrichment
    pub conversation_enrichment: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let prediction_requests = register_counter_vec_with_registry!(
            Opts::new("prediction_requests_total", "Total prediction requests"),
            &["status"],
            registry
        )?;

        let prediction_duration = register_histogram_with_registry!(
            "prediction_duration_seconds",
            "End-to-end prediction duration in seconds",
            registry
        )?;

        let validation_failures = register_counter_with_registry!(
            Opts::new(
                "validation_failures_total",
                "Prediction requests rejected by feature validation"
            ),
            registry
        )?;

        let scoring_process_duration = register_histogram_vec_with_registry!(
            "scoring_process_duration_seconds",
            "Scoring process wall time in seconds",
            &["outcome"],
            registry
        )?;

        let conversation_enrichment = register_counter_vec_with_registry!(
            Opts::new(
                "conversation_enrichment_total",
                "Conversation enrichment outcomes"
            ),
            &["outcome"],
            registry
        )?;

        Ok(Self {
            registry,
            prediction_requests,
            prediction_duration,
            validation_failures,
            scoring_process_duration,
            conversation_enrichment,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished prediction request
    pub fn record_prediction(&self, status: &str, seconds: f64) {
        self.prediction_requests.with_label_values(&[status]).inc();
        self.prediction_duration.observe(seconds);
    }

    pub fn record_validation_failure(&self) {
        self.validation_failures.inc();
    }

    /// Record the outcome of a conversation lookup
    pub fn record_enrichment(&self, outcome: &str) {
        self.conversation_enrichment.with_label_values(&[outcome]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
