use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Once;
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Resolution metrics
    pub static ref RESOLUTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("inference_resolutions_total", "Total resolved predictions by source tier"),
        &["source"]
    ).unwrap();

    pub static ref DECODE_FAILURES: IntCounter = IntCounter::new(
        "inference_decode_failures_total",
        "Total requests rejected because the image could not be decoded"
    ).unwrap();

    // Tier metrics
    pub static ref TIER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("inference_tier_failures_total", "Total tier attempts that escalated"),
        &["tier", "reason"]
    ).unwrap();

    pub static ref TIER_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "inference_tier_duration_seconds",
            "Tier attempt latency in seconds"
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["tier"]
    ).unwrap();

    pub static ref MODEL_SESSION_LOADS: IntCounter = IntCounter::new(
        "model_session_loads_total",
        "Total ONNX sessions created"
    ).unwrap();
}

static INIT: Once = Once::new();

/// Initialize metrics registry (safe to call more than once)
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(RESOLUTIONS.clone()),
            Box::new(DECODE_FAILURES.clone()),
            Box::new(TIER_FAILURES.clone()),
            Box::new(TIER_LATENCY.clone()),
            Box::new(MODEL_SESSION_LOADS.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("Failed to register collector: {}", e);
            }
        }
        tracing::info!("Metrics registry initialized with {} collectors", REGISTRY.gather().len());
    });
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_tier(&self, tier: &str) {
        TIER_LATENCY
            .with_label_values(&[tier])
            .observe(self.start.elapsed().as_secs_f64());
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Export metrics in Prometheus format
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
