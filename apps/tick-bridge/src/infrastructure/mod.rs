//! Infrastructure layer - Adapters and external integrations.

/// Bounded lock-free transfer queue.
pub mod queue;

/// Snapshot and bar payload encoding.
pub mod codec;

/// Redis pub/sub sink adapter.
pub mod redis;

/// Configuration from environment variables.
pub mod config;

/// Prometheus metrics.
pub mod metrics;

/// Tracing subscriber initialization.
pub mod telemetry;

/// CSV tick replay source.
pub mod replay;
