//! Simulated response latency.

use crate::metrics;
use std::time::Duration;

/// Delay the current request by `latency_ms`. Non-positive values are a no-op.
///
/// Suspends only the calling task; other connections keep being served.
pub async fn simulate(latency_ms: i64) -> Option<Duration> {
    if latency_ms <= 0 {
        return None;
    }
    let duration = Duration::from_millis(latency_ms as u64);
    tracing::debug!("Simulating {}ms latency", latency_ms);
    tokio::time::sleep(duration).await;
    metrics::record_simulated_latency(latency_ms as u64);
    Some(duration)
}
