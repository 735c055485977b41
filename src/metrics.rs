//! Prometheus metrics for the signing service
//!
//! All metrics live in a dedicated registry exposed on the metrics endpoint.

use lazy_static::lazy_static;
use prometheus::{
    opts, register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use std::time::Duration;
use tracing::debug;

lazy_static! {
    /// Registry for all signing metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Finished signing requests
    /// Labels: outcome (success or a failure kind such as admission_rejected)
    pub static ref SIGNING_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        opts!("signing_requests_total", "Total number of signing requests by outcome"),
        &["outcome"],
        REGISTRY
    )
    .expect("Failed to create signing_requests_total metric");

    /// Time spent inside the external signer
    /// Buckets cover a fast local signer up to a slow notarisation round trip
    pub static ref SIGNING_DURATION_SECONDS: Histogram = register_histogram_with_registry!(
        "signing_duration_seconds",
        "Time spent invoking the external signer",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        REGISTRY
    )
    .expect("Failed to create signing_duration_seconds metric");

    /// Signing jobs currently past admission
    pub static ref SIGNING_JOBS_ACTIVE: IntGauge = register_int_gauge_with_registry!(
        opts!("signing_jobs_active", "Current number of admitted signing jobs"),
        REGISTRY
    )
    .expect("Failed to create signing_jobs_active metric");
}

/// Force registration of every metric so the exposition is complete before
/// the first request arrives
pub fn init_metrics() {
    lazy_static::initialize(&SIGNING_REQUESTS_TOTAL);
    lazy_static::initialize(&SIGNING_DURATION_SECONDS);
    lazy_static::initialize(&SIGNING_JOBS_ACTIVE);

    debug!("Prometheus metrics registry initialized");
}

/// Count a finished request under its outcome label
pub fn record_signing_outcome(outcome: &str) {
    SIGNING_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record how long the signer ran
pub fn observe_signing_duration(duration: Duration) {
    SIGNING_DURATION_SECONDS.observe(duration.as_secs_f64());

    debug!(
        duration_ms = duration.as_millis() as u64,
        "Recorded signing duration metric"
    );
}

/// Gather all metrics and encode them in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e))
}

/// Keeps the active-jobs gauge raised for as long as it is alive
pub struct ActiveJobGuard {
    gauge: IntGauge,
}

impl ActiveJobGuard {
    pub fn new() -> Self {
        Self::tracking(SIGNING_JOBS_ACTIVE.clone())
    }

    fn tracking(gauge: IntGauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Default for ActiveJobGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_signing_outcome() {
        let before = SIGNING_REQUESTS_TOTAL
            .with_label_values(&["metrics_test_outcome"])
            .get();
        record_signing_outcome("metrics_test_outcome");
        record_signing_outcome("metrics_test_outcome");
        let after = SIGNING_REQUESTS_TOTAL
            .with_label_values(&["metrics_test_outcome"])
            .get();
        assert_eq!(after - before, 2);
    }

    #[test]
    fn test_observe_signing_duration() {
        let count_before = SIGNING_DURATION_SECONDS.get_sample_count();
        let sum_before = SIGNING_DURATION_SECONDS.get_sample_sum();

        observe_signing_duration(Duration::from_millis(250));
        observe_signing_duration(Duration::ZERO);

        // Signing tests elsewhere may observe concurrently
        assert!(SIGNING_DURATION_SECONDS.get_sample_count() - count_before >= 2);
        assert!(SIGNING_DURATION_SECONDS.get_sample_sum() - sum_before >= 0.25);
    }

    #[test]
    fn test_active_job_guard() {
        let gauge = IntGauge::new("test_jobs_active", "Guard test gauge").unwrap();

        let first = ActiveJobGuard::tracking(gauge.clone());
        assert_eq!(gauge.get(), 1);
        {
            let _second = ActiveJobGuard::tracking(gauge.clone());
            assert_eq!(gauge.get(), 2);
        }
        assert_eq!(gauge.get(), 1);

        drop(first);
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics();
        init_metrics();

        record_signing_outcome("success");

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("signing_requests_total"));
        assert!(metrics_text.contains("signing_duration_seconds"));
        assert!(metrics_text.contains("signing_jobs_active"));
        assert!(metrics_text.contains("# HELP"));
        assert!(metrics_text.contains("# TYPE"));
    }
}
