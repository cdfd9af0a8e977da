//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all dashboard metrics
pub const METRICS_PREFIX: &str = "vocalscale_admin";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.100, // 100ms
    0.250, // 250ms - P99 target
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for knowledge-processor calls (draft generation is slow)
pub const PROCESSOR_BUCKETS: &[f64] = &[
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Store metrics
    describe_counter!(
        format!("{}_store_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total hosted store requests"
    );

    describe_histogram!(
        format!("{}_store_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Hosted store request latency in seconds"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits, fresh or stale"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_cache_coalesced_total", METRICS_PREFIX),
        Unit::Count,
        "Callers that joined an in-flight fetch"
    );

    describe_counter!(
        format!("{}_cache_invalidations_total", METRICS_PREFIX),
        Unit::Count,
        "Cache invalidations by key prefix"
    );

    describe_gauge!(
        format!("{}_cache_entries", METRICS_PREFIX),
        Unit::Count,
        "Entries held by the query cache"
    );

    // Knowledge processor metrics
    describe_counter!(
        format!("{}_processor_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total knowledge processor requests"
    );

    describe_histogram!(
        format!("{}_processor_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Knowledge processor latency in seconds"
    );

    // Support workflow
    describe_counter!(
        format!("{}_ticket_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Ticket status transitions applied"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Helper to record a hosted store request
pub fn record_store_query(table: &str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_store_queries_total", METRICS_PREFIX),
        "table" => table.to_string(),
        "status" => outcome(success)
    )
    .increment(1);

    histogram!(
        format!("{}_store_query_duration_seconds", METRICS_PREFIX),
        "table" => table.to_string()
    )
    .record(duration_secs);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, resource: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "resource" => resource.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "resource" => resource.to_string()
        )
        .increment(1);
    }
}

pub fn record_cache_coalesced(resource: &str) {
    counter!(
        format!("{}_cache_coalesced_total", METRICS_PREFIX),
        "resource" => resource.to_string()
    )
    .increment(1);
}

pub fn record_cache_invalidation(prefix: &str, removed: usize) {
    counter!(
        format!("{}_cache_invalidations_total", METRICS_PREFIX),
        "prefix" => prefix.to_string()
    )
    .increment(1);
    tracing::debug!(prefix, removed, "Cache invalidated");
}

pub fn record_cache_size(entries: usize) {
    gauge!(format!("{}_cache_entries", METRICS_PREFIX)).set(entries as f64);
}

/// Helper to record knowledge processor metrics
pub fn record_processor(endpoint: &str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_processor_requests_total", METRICS_PREFIX),
        "endpoint" => endpoint.to_string(),
        "status" => outcome(success)
    )
    .increment(1);

    histogram!(
        format!("{}_processor_duration_seconds", METRICS_PREFIX),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

pub fn record_ticket_transition(from: &str, to: &str) {
    counter!(
        format!("{}_ticket_transitions_total", METRICS_PREFIX),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}
