//! Prometheus metrics for monitoring the chat relay server.
//!
//! All metrics live in the default registry so `GET /metrics` can gather them
//! with [`prometheus::gather`].

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    GaugeVec, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of HTTP requests by method, endpoint and status
    pub request_count: IntCounterVec,

    /// HTTP request duration histogram in seconds
    pub request_duration: HistogramVec,

    /// Number of currently active requests by endpoint
    pub active_requests: GaugeVec,

    /// Finished relay sessions by outcome (completed, failed, client_gone)
    pub relay_sessions: IntCounterVec,

    /// Relay session duration in seconds by outcome
    pub relay_duration: HistogramVec,

    /// Token frames written to clients
    pub tokens_relayed: IntCounter,

    /// Clients that went away mid-stream
    pub client_disconnects: IntCounter,

    /// Upstream failures by kind (auth, rate_limited, network, unclassified)
    pub upstream_failures: IntCounterVec,

    /// Responses served by the mock token source
    pub mock_responses: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// Safe to call more than once; later calls return the same instance.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "chat_relay_requests_total",
            "Total number of HTTP requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "chat_relay_request_duration_seconds",
            "HTTP request duration in seconds (time to first byte for streams)",
            &["method", "endpoint"],
            vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
        )
        .expect("Failed to register request_duration metric");

        let active_requests = register_gauge_vec!(
            "chat_relay_active_requests",
            "Number of active requests",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric");

        let relay_sessions = register_int_counter_vec!(
            "chat_relay_stream_sessions_total",
            "Finished relay sessions by outcome",
            &["outcome"]
        )
        .expect("Failed to register relay_sessions metric");

        let relay_duration = register_histogram_vec!(
            "chat_relay_stream_duration_seconds",
            "Relay session duration in seconds",
            &["outcome"],
            vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]
        )
        .expect("Failed to register relay_duration metric");

        let tokens_relayed = register_int_counter!(
            "chat_relay_tokens_total",
            "Token frames written to clients"
        )
        .expect("Failed to register tokens_relayed metric");

        let client_disconnects = register_int_counter!(
            "chat_relay_client_disconnects_total",
            "Clients that disconnected before the stream finished"
        )
        .expect("Failed to register client_disconnects metric");

        let upstream_failures = register_int_counter_vec!(
            "chat_relay_upstream_failures_total",
            "Upstream provider failures by kind",
            &["kind"]
        )
        .expect("Failed to register upstream_failures metric");

        let mock_responses = register_int_counter!(
            "chat_relay_mock_responses_total",
            "Responses generated by the mock token source"
        )
        .expect("Failed to register mock_responses metric");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            relay_sessions,
            relay_duration,
            tokens_relayed,
            client_disconnects,
            upstream_failures,
            mock_responses,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
