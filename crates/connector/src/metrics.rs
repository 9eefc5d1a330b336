//! Prometheus metrics for the ingestion pipeline

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

const LABEL_TOPIC: &str = "topic";
const LABEL_REASON: &str = "reason";
const LABEL_RESULT: &str = "result";

static RECORDS_RECEIVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "quoteflow_records_received_total",
        "Records received from the feed"
    )
    .expect("Failed to register records_received_total metric")
});

static RECORDS_PUBLISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "quoteflow_records_published_total",
        "Records enqueued on the bus per topic",
        &[LABEL_TOPIC]
    )
    .expect("Failed to register records_published_total metric")
});

static RECORDS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "quoteflow_records_dropped_total",
        "Records dropped before reaching the bus",
        &[LABEL_REASON]
    )
    .expect("Failed to register records_dropped_total metric")
});

static DELIVERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "quoteflow_deliveries_total",
        "Broker delivery reports by outcome",
        &[LABEL_RESULT]
    )
    .expect("Failed to register deliveries_total metric")
});

static FEED_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "quoteflow_feed_connected",
        "Feed session status (1=listening, 0=not listening)"
    )
    .expect("Failed to register feed_connected metric")
});

static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "quoteflow_pipeline_duration_seconds",
        "Time from frame receive to bus enqueue",
        &[LABEL_TOPIC],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    )
    .expect("Failed to register pipeline_duration_seconds metric")
});

pub fn inc_received() {
    RECORDS_RECEIVED.inc();
}

pub fn inc_published(topic: &str) {
    RECORDS_PUBLISHED.with_label_values(&[topic]).inc();
}

pub fn inc_dropped(reason: &str) {
    RECORDS_DROPPED.with_label_values(&[reason]).inc();
}

pub fn dropped_count(reason: &str) -> u64 {
    RECORDS_DROPPED.with_label_values(&[reason]).get()
}

pub fn inc_delivery(delivered: bool) {
    let result = if delivered { "delivered" } else { "failed" };
    DELIVERIES.with_label_values(&[result]).inc();
}

pub fn set_feed_connected(connected: bool) {
    FEED_CONNECTED.set(i64::from(connected));
}

pub fn observe_pipeline_duration(topic: &str, seconds: f64) {
    PIPELINE_DURATION.with_label_values(&[topic]).observe(seconds);
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}
