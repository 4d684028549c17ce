//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission (cooldown decisions)
//! - Resolution (catalog outcomes, probes, skipped candidates)
//! - Relay (starts, exits, run time, automatic retries)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Admission Metrics
// =============================================================================

/// Admission decisions by outcome.
pub static ADMISSION_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "clipcast_admission_decisions_total",
            "Total admission decisions",
        ),
        &["decision"], // "granted", "exempt", "denied"
    )
    .unwrap()
});

// =============================================================================
// Resolution Metrics
// =============================================================================

/// Resolution attempts by outcome.
pub static RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipcast_resolutions_total", "Total resolution attempts"),
        &["outcome"], // "found", "empty", "failed"
    )
    .unwrap()
});

/// Candidates skipped because they probed as unplayable.
pub static CANDIDATES_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipcast_candidates_skipped_total",
        "Candidates skipped as unplayable",
    )
    .unwrap()
});

/// Duration probe latency in seconds.
pub static PROBE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipcast_probe_duration_seconds",
            "Duration of a single stream probe",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Relay Metrics
// =============================================================================

/// Relays started by trigger.
pub static RELAYS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipcast_relays_started_total", "Total relays started"),
        &["trigger"], // "advance", "next", "auto"
    )
    .unwrap()
});

/// Relay exits by outcome.
pub static RELAY_EXITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipcast_relay_exits_total", "Total relay exits"),
        &["outcome"], // "completed", "crashed", "terminated"
    )
    .unwrap()
});

/// Wall-clock relay run time in seconds.
pub static RELAY_RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipcast_relay_run_duration_seconds",
            "How long a relay ran before exiting",
        )
        .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Automatic advance retries scheduled.
pub static AUTO_ADVANCE_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipcast_auto_advance_retries_total",
        "Automatic advance attempts that failed and were rescheduled",
    )
    .unwrap()
});

/// All core metrics, for registration with the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Admission
        Box::new(ADMISSION_DECISIONS.clone()),
        // Resolution
        Box::new(RESOLUTIONS.clone()),
        Box::new(CANDIDATES_SKIPPED.clone()),
        Box::new(PROBE_DURATION.clone()),
        // Relay
        Box::new(RELAYS_STARTED.clone()),
        Box::new(RELAY_EXITS.clone()),
        Box::new(RELAY_RUN_DURATION.clone()),
        Box::new(AUTO_ADVANCE_RETRIES.clone()),
    ]
}
