//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following the
//! Hexagonal Architecture pattern.
//!
//! ## Driver Port (Inbound)
//!
//! - [`MarketDataHandler`]: the narrow callback surface a source adapter
//!   drives. Vendor APIs expose dozens of callbacks; adapters map the
//!   handful this pipeline consumes down to this trait and ignore the rest.
//!
//! ## Driven Port (Outbound)
//!
//! - [`SnapshotSink`]: the pub/sub transport the publisher writes to.
//!   Delivery is at-most-once and no ordering across topics is assumed.

use crate::domain::event::{BarUpdate, InstrumentHandle};

// =============================================================================
// Connection State
// =============================================================================

/// Upstream session state reported by the source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Session established.
    Connected,
    /// Session lost.
    Disconnected,
    /// Session re-established after a loss. The adapter must also call
    /// `Pipeline::signal_reconnect` so stale aggregation state is cleared,
    /// and re-issue its subscriptions.
    Reconnected,
}

impl ConnectionState {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnected => "reconnected",
        }
    }
}

// =============================================================================
// Market Data Handler (driver port)
// =============================================================================

/// Callback surface the upstream source adapter drives.
///
/// Implementations run synchronously on the adapter's delivery thread and
/// must complete in bounded time: no blocking, no I/O, no retries. All
/// timestamps are source-provided epoch milliseconds.
pub trait MarketDataHandler: Send + Sync {
    /// A top-of-book quote for a subscribed handle.
    fn on_quote(
        &self,
        handle: InstrumentHandle,
        timestamp_ms: i64,
        bid_price: f64,
        ask_price: f64,
        bid_size: u32,
        ask_size: u32,
    );

    /// A trade print for a subscribed handle.
    fn on_trade(
        &self,
        handle: InstrumentHandle,
        timestamp_ms: i64,
        price: f64,
        size: u32,
        past_limit: bool,
    );

    /// An OHLCV bar for a subscribed handle.
    fn on_bar(&self, handle: InstrumentHandle, timestamp_ms: i64, bar: BarUpdate);

    /// Upstream session state change.
    fn on_connection(&self, state: ConnectionState);

    /// Out-of-band source diagnostic (vendor error/status codes).
    fn on_source_error(&self, code: i32, message: &str);
}

// =============================================================================
// Snapshot Sink (driven port)
// =============================================================================

/// Error publishing to the sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink has no live connection.
    #[error("sink not connected")]
    NotConnected,

    /// The transport rejected or failed the publish.
    #[error("sink transport error: {0}")]
    Transport(String),
}

/// Pub/sub transport the publisher writes encoded snapshots to.
///
/// Called only from the consumer thread; a failed publish must return
/// promptly rather than block the drain loop.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotSink: Send {
    /// Publish one payload to a topic.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when the transport is down or rejects the
    /// message. Failures are counted by the caller and never retried
    /// synchronously.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError>;
}

// =============================================================================
// Tests
// =============================================================================
