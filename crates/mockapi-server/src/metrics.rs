//! Prometheus metrics for the mock server.
//!
//! Tracks served outcomes, rate limiting, relay performance and degraded paths.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, register_int_counter,
    CounterVec, Encoder, Histogram, HistogramVec, IntCounter, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Requests by final outcome and status code
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mockapi_requests_total",
        "Total number of mock requests by outcome",
        &["outcome", "status"]  // outcome: served|proxied|not_found|rate_limited|...
    )
    .unwrap();

    pub static ref RATE_LIMITED_TOTAL: IntCounter = register_int_counter!(
        "mockapi_rate_limited_total",
        "Requests rejected by the global rate limiter"
    )
    .unwrap();

    /// Relay round trip, including failures (status 502)
    pub static ref RELAY_DURATION_MS: HistogramVec = register_histogram_vec!(
        "mockapi_relay_duration_ms",
        "Duration of forward-proxy relays in milliseconds",
        &["status"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    pub static ref SIMULATED_LATENCY_MS: Histogram = register_histogram!(
        "mockapi_simulated_latency_ms",
        "Histogram of simulated latency in milliseconds",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    pub static ref SELECTION_FALLBACK_TOTAL: IntCounter = register_int_counter!(
        "mockapi_selection_fallback_total",
        "Weighted selections that fell through to the uniform fallback"
    )
    .unwrap();

    pub static ref REQUEST_LOG_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "mockapi_request_log_failures_total",
        "Request log entries that could not be persisted"
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(outcome: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[outcome, &status.to_string()])
        .inc();
}

pub fn record_rate_limited() {
    RATE_LIMITED_TOTAL.inc();
}

pub fn record_relay_duration(status: u16, duration_ms: f64) {
    RELAY_DURATION_MS
        .with_label_values(&[&status.to_string()])
        .observe(duration_ms);
}

pub fn record_simulated_latency(duration_ms: u64) {
    SIMULATED_LATENCY_MS.observe(duration_ms as f64);
}

pub fn record_selection_fallback() {
    SELECTION_FALLBACK_TOTAL.inc();
}

pub fn record_request_log_failure() {
    REQUEST_LOG_FAILURES_TOTAL.inc();
}
