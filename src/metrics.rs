//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub batches_succeeded: IntCounter,
    pub batches_failed: IntCounter,
    pub batch_attempts: IntCounter,
    pub batch_retries: IntCounter,
    pub confirmation_timeouts: IntCounter,
    pub recipients_paid: IntCounter,
    pub errors_by_category: IntCounterVec,

    // Histograms
    pub batch_latency: Histogram,
    pub confirmation_latency: Histogram,
    pub rpc_latency: Histogram,
    pub build_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let batches_succeeded = IntCounter::with_opts(Opts::new(
            "batches_succeeded_total",
            "Number of batches confirmed on-chain",
        ))?;

        let batches_failed = IntCounter::with_opts(Opts::new(
            "batches_failed_total",
            "Number of batches that ended in error",
        ))?;

        let batch_attempts = IntCounter::with_opts(Opts::new(
            "batch_attempts_total",
            "Number of build/sign/submit/confirm attempts",
        ))?;

        let batch_retries = IntCounter::with_opts(Opts::new(
            "batch_retries_total",
            "Number of attempts that were retries of a failed attempt",
        ))?;

        let confirmation_timeouts = IntCounter::with_opts(Opts::new(
            "confirmation_timeouts_total",
            "Number of confirmations that stayed inconclusive past the deadline",
        ))?;

        let recipients_paid = IntCounter::with_opts(Opts::new(
            "recipients_paid_total",
            "Number of recipients in confirmed batches",
        ))?;

        let errors_by_category = IntCounterVec::new(
            Opts::new("transfer_errors_total", "Attempt failures by error category"),
            &["category"],
        )?;

        let batch_latency = Histogram::with_opts(
            HistogramOpts::new("batch_latency_seconds", "Wall time from first build to terminal state")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new("confirmation_latency_seconds", "Time spent awaiting confirmation")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Instruction build and compile latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(batches_succeeded.clone()))?;
        registry.register(Box::new(batches_failed.clone()))?;
        registry.register(Box::new(batch_attempts.clone()))?;
        registry.register(Box::new(batch_retries.clone()))?;
        registry.register(Box::new(confirmation_timeouts.clone()))?;
        registry.register(Box::new(recipients_paid.clone()))?;
        registry.register(Box::new(errors_by_category.clone()))?;
        registry.register(Box::new(batch_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;

        Ok(Self {
            registry,
            batches_succeeded,
            batches_failed,
            batch_attempts,
            batch_retries,
            confirmation_timeouts,
            recipients_paid,
            errors_by_category,
            batch_latency,
            confirmation_latency,
            rpc_latency,
            build_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count one attempt failure under its error category
    pub fn record_error(&self, category: &str) {
        self.errors_by_category.with_label_values(&[category]).inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
    histogram_name: Option<&'static str>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            histogram_name: None,
        }
    }

    /// Create a timer with a histogram name for automatic recording
    pub fn with_name(histogram_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name: Some(histogram_name),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Finish the timer and record to the associated histogram
    pub fn finish(self) {
        let Some(name) = self.histogram_name else {
            return;
        };
        let duration = self.elapsed_secs();
        match name {
            "batch_latency_seconds" => metrics().batch_latency.observe(duration),
            "confirmation_latency_seconds" => metrics().confirmation_latency.observe(duration),
            "rpc_latency_seconds" => metrics().rpc_latency.observe(duration),
            "build_latency_seconds" => metrics().build_latency.observe(duration),
            _ => tracing::debug!("Unknown histogram name: {}", name),
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
