//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramTimer, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kvblog_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "kvblog_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Store Metrics
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kvblog_store_operations_total", "Total number of key-value store operations"),
        &["backend", "operation"]
    ).expect("metric can be created");
    pub static ref STORE_OPERATION_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "kvblog_store_operation_duration_seconds",
            "Key-value store operation duration in seconds"
        ).buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["backend", "operation"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kvblog_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kvblog_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("kvblog_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Domain Metrics
    pub static ref WRITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kvblog_writes_total", "Total number of logical write actions"),
        &["action", "mode"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kvblog_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(STORE_OPERATIONS_TOTAL.clone()))
            .expect("STORE_OPERATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(STORE_OPERATION_DURATION_SECONDS.clone()))
            .expect("STORE_OPERATION_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_SIZE.clone()))
            .expect("CACHE_SIZE can be registered");
        REGISTRY
            .register(Box::new(WRITES_TOTAL.clone()))
            .expect("WRITES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Count one store operation and time it until the returned timer drops.
pub fn store_timer(backend: &str, operation: &str) -> HistogramTimer {
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[backend, operation])
        .inc();
    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[backend, operation])
        .start_timer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_metrics();
        // A second registration would panic on duplicate collectors.
        init_metrics();

        ERRORS_TOTAL.with_label_values(&["not_found"]).inc();
        assert!(
            REGISTRY
                .gather()
                .iter()
                .any(|family| family.get_name() == "kvblog_errors_total")
        );
    }

    #[test]
    fn store_timer_counts_operations() {
        let before = STORE_OPERATIONS_TOTAL
            .with_label_values(&["test", "noop"])
            .get();
        drop(store_timer("test", "noop"));
        let after = STORE_OPERATIONS_TOTAL
            .with_label_values(&["test", "noop"])
            .get();
        assert_eq!(after, before + 1);
    }
}
