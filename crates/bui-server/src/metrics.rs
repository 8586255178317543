//! Prometheus metrics export

use std::sync::Arc;

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, Encoder, HistogramOpts,
    HistogramVec, Opts, Registry, TextEncoder,
};
use tracing::error;

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Namespace prefix for metrics
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "burp_ui".to_string(),
        }
    }
}

/// Server metrics
pub struct Metrics {
    registry: Registry,

    // Request metrics
    pub requests_total: CounterVec,
    pub request_duration_seconds: HistogramVec,

    // Cache metrics
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,
    pub cache_clears_total: Counter,

    // Error metrics
    pub internal_errors_total: CounterVec,

    // Auth metrics
    pub auth_attempts_total: CounterVec,
}

impl Metrics {
    pub fn new(config: MetricsConfig) -> anyhow::Result<Self> {
        let registry = Registry::new();
        let ns = &config.namespace;

        let requests_total = register_counter_vec_with_registry!(
            Opts::new("requests_total", "Total API requests").namespace(ns),
            &["endpoint", "method", "status"],
            registry
        )?;

        let request_duration_seconds = register_histogram_vec_with_registry!(
            HistogramOpts::new("request_duration_seconds", "Request latency in seconds")
                .namespace(ns)
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["endpoint", "method"],
            registry
        )?;

        let cache_hits_total = register_counter_with_registry!(
            Opts::new("cache_hits_total", "Responses served from the cache").namespace(ns),
            registry
        )?;

        let cache_misses_total = register_counter_with_registry!(
            Opts::new("cache_misses_total", "Cacheable responses recomputed").namespace(ns),
            registry
        )?;

        let cache_clears_total = register_counter_with_registry!(
            Opts::new("cache_clears_total", "Full cache invalidations").namespace(ns),
            registry
        )?;

        let internal_errors_total = register_counter_vec_with_registry!(
            Opts::new("internal_errors_total", "Internal failures by endpoint").namespace(ns),
            &["endpoint"],
            registry
        )?;

        let auth_attempts_total = register_counter_vec_with_registry!(
            Opts::new("auth_attempts_total", "Authentication attempts").namespace(ns),
            &["result"],
            registry
        )?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            cache_hits_total,
            cache_misses_total,
            cache_clears_total,
            internal_errors_total,
            auth_attempts_total,
        })
    }

    /// Record a request
    pub fn record_request(&self, endpoint: &str, method: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[endpoint, method, status.as_str()])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[endpoint, method])
            .observe(duration_secs);
    }

    pub fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits_total.inc();
        } else {
            self.cache_misses_total.inc();
        }
    }

    pub fn record_cache_clear(&self) {
        self.cache_clears_total.inc();
    }

    pub fn record_internal_error(&self, endpoint: &str) {
        self.internal_errors_total.with_label_values(&[endpoint]).inc();
    }

    pub fn record_auth_attempt(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.auth_attempts_total.with_label_values(&[result]).inc();
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Shared handle
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_recording() {
        let metrics = Metrics::new(MetricsConfig::default()).unwrap();

        metrics.record_request("clients_stats", "GET", 200, 0.05);
        metrics.record_request("clients_stats", "GET", 500, 0.25);

        let output = metrics.export();
        assert!(output.contains("burp_ui_requests_total"));
        assert!(output.contains("burp_ui_request_duration_seconds"));
    }

    #[test]
    fn test_cache_metrics() {
        let metrics = Metrics::new(MetricsConfig::default()).unwrap();
        metrics.record_cache(true);
        metrics.record_cache(false);
        metrics.record_cache(false);
        metrics.record_cache_clear();

        assert_eq!(metrics.cache_hits_total.get() as u64, 1);
        assert_eq!(metrics.cache_misses_total.get() as u64, 2);
        assert_eq!(metrics.cache_clears_total.get() as u64, 1);
    }

    #[test]
    fn test_error_and_auth_metrics() {
        let metrics = Metrics::new(MetricsConfig::default()).unwrap();
        metrics.record_internal_error("clients_report");
        metrics.record_auth_attempt(false);

        let output = metrics.export();
        assert!(output.contains("burp_ui_internal_errors_total"));
        assert!(output.contains("burp_ui_auth_attempts_total"));
        assert!(output.contains("# TYPE"));
    }
}
