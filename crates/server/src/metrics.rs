//! Server-side Prometheus metrics: HTTP traffic, caller identity failures,
//! WebSocket subscribers and the playback gauge. The core crate's relay and
//! admission metrics share the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use tracing::error;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// Request latency by matched route.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipcast_http_request_duration_seconds",
            "Request latency in seconds",
        )
        // Advances wait for relay termination and probing, hence the long tail.
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipcast_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "clipcast_http_requests_in_flight",
        "Requests being served right now",
    )
    .unwrap()
});

/// Requests refused for missing adapter credentials or a missing or
/// malformed caller identity.
pub static IDENTITY_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "clipcast_identity_failures_total",
            "Total requests refused for failed authentication or a bad caller identity",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "clipcast_ws_connections_active",
        "Connected WebSocket subscribers",
    )
    .unwrap()
});

pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipcast_ws_connections_total",
        "WebSocket subscribers accepted since startup",
    )
    .unwrap()
});

pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipcast_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// Subscribers that fell behind the event broadcast.
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipcast_ws_lag_events_total",
        "Times a WebSocket subscriber lagged behind the event stream",
    )
    .unwrap()
});

// =============================================================================
// Playback Metrics (collected dynamically)
// =============================================================================

/// Whether a relay is currently playing (1) or the session is idle (0).
pub static PLAYBACK_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "clipcast_playback_active",
        "Whether a relay is currently playing (1) or idle (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(IDENTITY_FAILURES_TOTAL.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Playback
    registry
        .register(Box::new(PLAYBACK_ACTIVE.clone()))
        .unwrap();

    // Core metrics (admission, resolution, relays)
    for metric in clipcast_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Prometheus text exposition of the shared registry.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Refresh gauges that mirror orchestrator state. Called before each scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let playing = state.playback().status().is_playing();
    PLAYBACK_ACTIVE.set(if playing { 1 } else { 0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("clipcast_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_server_and_core_metrics() {
        // Prometheus only outputs metrics that have been touched.
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        WS_CONNECTIONS_ACTIVE.set(0);
        WS_CONNECTIONS_TOTAL.inc();
        PLAYBACK_ACTIVE.set(0);
        clipcast_core::metrics::RELAYS_STARTED
            .with_label_values(&["auto"])
            .inc();
        clipcast_core::metrics::AUTO_ADVANCE_RETRIES.inc();

        let output = encode_metrics();

        assert!(output.contains("clipcast_http_request_duration_seconds"));
        assert!(output.contains("clipcast_http_requests_in_flight"));
        assert!(output.contains("clipcast_ws_connections_active"));
        assert!(output.contains("clipcast_ws_connections_total"));
        assert!(output.contains("clipcast_playback_active"));
        assert!(output.contains("clipcast_relays_started_total"));
        assert!(output.contains("clipcast_auto_advance_retries_total"));
    }
}
