//! Prometheus Metrics Module
//!
//! Exposes bridge metrics in Prometheus format for the surrounding
//! operational layer. The core never reads these itself.
//!
//! # Metrics Categories
//!
//! - **Events**: merged events by kind, drops on queue overflow, rejected
//!   malformed events, unresolved handles
//! - **Publishing**: snapshots and bars published, publish failures
//! - **Queue**: current transfer queue depth
//! - **Source**: upstream connection state
//!
//! Producer-side tallies (drops, rejects, unresolved) are kept as plain
//! atomics on the hot path and mirrored into Prometheus counters by the
//! consumer loop via absolute updates, so the producer never touches the
//! metrics registry.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::application::ports::ConnectionState;
use crate::domain::event::UpdateKind;

// =============================================================================
// Initialization
// =============================================================================

static METRICS_INIT: OnceLock<()> = OnceLock::new();

/// Install the Prometheus recorder and register metric descriptions.
///
/// With a non-zero `port` the exporter serves `/metrics` on
/// `0.0.0.0:<port>`; with zero only the recorder is installed. Calling
/// more than once is a no-op.
pub fn init_metrics(port: u16) {
    METRICS_INIT.get_or_init(|| {
        let result = if port == 0 {
            PrometheusBuilder::new().install_recorder().map(|_| ())
        } else {
            PrometheusBuilder::new()
                .with_http_listener(([0, 0, 0, 0], port))
                .install()
        };

        if let Err(e) = result {
            tracing::error!(error = %e, port, "failed to install Prometheus exporter");
        }
        register_metrics();
    });
}

fn register_metrics() {
    describe_counter!(
        "tick_bridge_events_merged_total",
        "Events merged into instrument snapshots, by kind"
    );
    describe_counter!(
        "tick_bridge_events_dropped_total",
        "Events dropped because the transfer queue was full"
    );
    describe_counter!(
        "tick_bridge_events_rejected_total",
        "Malformed events rejected at normalization"
    );
    describe_counter!(
        "tick_bridge_unresolved_handles_total",
        "Events discarded because their handle was not in the directory"
    );
    describe_counter!(
        "tick_bridge_snapshots_published_total",
        "Complete snapshots published to the sink"
    );
    describe_counter!(
        "tick_bridge_bars_published_total",
        "Bars published to the sink"
    );
    describe_counter!(
        "tick_bridge_publish_failures_total",
        "Publishes rejected or failed by the sink"
    );
    describe_gauge!(
        "tick_bridge_queue_depth",
        "Current transfer queue depth"
    );
    describe_gauge!(
        "tick_bridge_source_connected",
        "Upstream source connection state (1 = connected)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an event merged by the aggregator.
pub fn record_event_merged(kind: UpdateKind) {
    counter!("tick_bridge_events_merged_total", "kind" => kind.as_str()).increment(1);
}

/// Record a snapshot published to the sink.
pub fn record_snapshot_published() {
    counter!("tick_bridge_snapshots_published_total").increment(1);
}

/// Record a bar published to the sink.
pub fn record_bar_published() {
    counter!("tick_bridge_bars_published_total").increment(1);
}

/// Record a failed publish.
pub fn record_publish_failure() {
    counter!("tick_bridge_publish_failures_total").increment(1);
}

/// Update the transfer queue depth gauge.
pub fn set_queue_depth(depth: f64) {
    gauge!("tick_bridge_queue_depth").set(depth);
}

/// Mirror the producer-side atomic tallies into Prometheus counters.
///
/// Called from the consumer loop with absolute values.
pub fn sync_producer_counters(dropped: u64, rejected: u64, unresolved: u64) {
    counter!("tick_bridge_events_dropped_total").absolute(dropped);
    counter!("tick_bridge_events_rejected_total").absolute(rejected);
    counter!("tick_bridge_unresolved_handles_total").absolute(unresolved);
}

/// Update the upstream connection state gauge.
pub fn set_source_connected(state: ConnectionState) {
    let value = match state {
        ConnectionState::Connected | ConnectionState::Reconnected => 1.0,
        ConnectionState::Disconnected => 0.0,
    };
    gauge!("tick_bridge_source_connected").set(value);
}

// =============================================================================
// Tests
// =============================================================================
