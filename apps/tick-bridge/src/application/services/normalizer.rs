//! Event Normalizer
//!
//! Runs synchronously on the source adapter's delivery thread: converts
//! each raw callback into a canonical [`UpdateEvent`] and offers it to the
//! transfer queue without blocking.
//!
//! # Performance contract
//!
//! Bounded time per call, no heap allocation, no I/O, no retries. The only
//! lock is the directory's read lock, taken once per event and uncontended
//! in steady state (the subscription path writes rarely). If the queue is
//! full the event is dropped and counted - the producer never waits on the
//! consumer.

use std::sync::Arc;

use crate::application::ports::{ConnectionState, MarketDataHandler};
use crate::application::services::counters::PipelineCounters;
use crate::domain::directory::InstrumentDirectory;
use crate::domain::event::{BarUpdate, InstrumentHandle, UpdateEvent};
use crate::infrastructure::metrics;
use crate::infrastructure::queue::TransferQueue;

/// Vendor status codes that are informational rather than errors.
const INFORMATIONAL_CODES: &[i32] = &[2104, 2106, 2158];

/// Producer-side normalizer implementing the upstream callback port.
pub struct EventNormalizer {
    directory: Arc<InstrumentDirectory>,
    queue: Arc<TransferQueue<UpdateEvent>>,
    counters: Arc<PipelineCounters>,
}

impl std::fmt::Debug for EventNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNormalizer")
            .field("queue_depth", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl EventNormalizer {
    /// Create a normalizer over the shared directory, queue, and counters.
    #[must_use]
    pub fn new(
        directory: Arc<InstrumentDirectory>,
        queue: Arc<TransferQueue<UpdateEvent>>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            directory,
            queue,
            counters,
        }
    }

    /// Validate and offer one event to the transfer queue.
    fn offer(&self, event: UpdateEvent) {
        if !event.payload.is_well_formed() {
            self.counters.record_rejected();
            tracing::trace!(handle = event.handle, kind = event.kind().as_str(), "rejected malformed event");
            return;
        }

        if !self.directory.contains(event.handle) {
            self.counters.record_unresolved();
            tracing::debug!(handle = event.handle, "discarding event for unresolved handle");
            return;
        }

        // The queue counts its own drops; nothing else to do on overflow.
        if !self.queue.try_push(event) {
            tracing::trace!(handle = event.handle, "transfer queue full, event dropped");
        }
    }
}

impl MarketDataHandler for EventNormalizer {
    fn on_quote(
        &self,
        handle: InstrumentHandle,
        timestamp_ms: i64,
        bid_price: f64,
        ask_price: f64,
        bid_size: u32,
        ask_size: u32,
    ) {
        self.offer(UpdateEvent::quote(
            handle, timestamp_ms, bid_price, ask_price, bid_size, ask_size,
        ));
    }

    fn on_trade(
        &self,
        handle: InstrumentHandle,
        timestamp_ms: i64,
        price: f64,
        size: u32,
        past_limit: bool,
    ) {
        self.offer(UpdateEvent::trade(handle, timestamp_ms, price, size, past_limit));
    }

    fn on_bar(&self, handle: InstrumentHandle, timestamp_ms: i64, bar: BarUpdate) {
        self.offer(UpdateEvent::bar(handle, timestamp_ms, bar));
    }

    fn on_connection(&self, state: ConnectionState) {
        metrics::set_source_connected(state);
        match state {
            ConnectionState::Connected => tracing::info!("upstream source connected"),
            ConnectionState::Disconnected => tracing::warn!("upstream source disconnected"),
            ConnectionState::Reconnected => {
                tracing::info!("upstream source reconnected; expecting state reset and re-subscription");
            }
        }
    }

    fn on_source_error(&self, code: i32, message: &str) {
        if INFORMATIONAL_CODES.contains(&code) {
            tracing::info!(code, message, "source status");
        } else {
            tracing::warn!(code, message, "source error");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
