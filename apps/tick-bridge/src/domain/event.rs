//! Canonical Update Events
//!
//! A single atomic fact from the upstream source, normalized into a
//! fixed-shape value. Events are constructed once inside a source callback,
//! moved by value into the transfer queue, and consumed exactly once by the
//! aggregator - they are never shared across threads by reference.
//!
//! Timestamps are source-provided epoch milliseconds, not the wall clock at
//! receipt.

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque, source-assigned identifier for a live subscription.
///
/// Distinct from the human-readable instrument identifier; several handles
/// may feed the same instrument (e.g. separate quote and trade streams).
pub type InstrumentHandle = u32;

/// Canonical, human-readable instrument identifier (symbol).
pub type InstrumentId = String;

// =============================================================================
// Payloads
// =============================================================================

/// Top-of-book quote fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteUpdate {
    /// Best bid price.
    pub bid_price: f64,
    /// Best ask price.
    pub ask_price: f64,
    /// Size available at the bid.
    pub bid_size: u32,
    /// Size available at the ask.
    pub ask_size: u32,
}

/// Last-trade fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeUpdate {
    /// Trade price.
    pub price: f64,
    /// Trade size.
    pub size: u32,
    /// Whether the trade printed past the limit.
    pub past_limit: bool,
}

/// Aggregated OHLCV bar fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarUpdate {
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume over the bar interval.
    pub volume: u64,
}

/// Type-specific payload of an update event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdatePayload {
    /// Top-of-book quote.
    Quote(QuoteUpdate),
    /// Last trade.
    Trade(TradeUpdate),
    /// OHLCV bar. Bars bypass aggregation and publish immediately.
    Bar(BarUpdate),
}

impl UpdatePayload {
    /// Check that every price field is a finite, non-negative number.
    ///
    /// Events failing this check are rejected at the normalizer and counted,
    /// never propagated.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        fn ok(price: f64) -> bool {
            price.is_finite() && price >= 0.0
        }

        match self {
            Self::Quote(q) => ok(q.bid_price) && ok(q.ask_price),
            Self::Trade(t) => ok(t.price),
            Self::Bar(b) => ok(b.open) && ok(b.high) && ok(b.low) && ok(b.close),
        }
    }

    /// Discriminator for this payload.
    #[must_use]
    pub const fn kind(&self) -> UpdateKind {
        match self {
            Self::Quote(_) => UpdateKind::Quote,
            Self::Trade(_) => UpdateKind::Trade,
            Self::Bar(_) => UpdateKind::Bar,
        }
    }
}

/// Discriminator for update payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// Top-of-book quote.
    Quote,
    /// Last trade.
    Trade,
    /// OHLCV bar.
    Bar,
}

impl UpdateKind {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Trade => "trade",
            Self::Bar => "bar",
        }
    }
}

// =============================================================================
// Update Event
// =============================================================================

/// One atomic fact from the source, addressed by subscription handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateEvent {
    /// Subscription handle the source delivered this fact under.
    pub handle: InstrumentHandle,
    /// Source-provided event timestamp, epoch milliseconds.
    pub timestamp_ms: i64,
    /// Type-specific fields.
    pub payload: UpdatePayload,
}

impl UpdateEvent {
    /// Build a quote event.
    #[must_use]
    pub const fn quote(
        handle: InstrumentHandle,
        timestamp_ms: i64,
        bid_price: f64,
        ask_price: f64,
        bid_size: u32,
        ask_size: u32,
    ) -> Self {
        Self {
            handle,
            timestamp_ms,
            payload: UpdatePayload::Quote(QuoteUpdate {
                bid_price,
                ask_price,
                bid_size,
                ask_size,
            }),
        }
    }

    /// Build a trade event.
    #[must_use]
    pub const fn trade(
        handle: InstrumentHandle,
        timestamp_ms: i64,
        price: f64,
        size: u32,
        past_limit: bool,
    ) -> Self {
        Self {
            handle,
            timestamp_ms,
            payload: UpdatePayload::Trade(TradeUpdate {
                price,
                size,
                past_limit,
            }),
        }
    }

    /// Build a bar event.
    #[must_use]
    pub const fn bar(
        handle: InstrumentHandle,
        timestamp_ms: i64,
        bar: BarUpdate,
    ) -> Self {
        Self {
            handle,
            timestamp_ms,
            payload: UpdatePayload::Bar(bar),
        }
    }

    /// Discriminator for this event's payload.
    #[must_use]
    pub const fn kind(&self) -> UpdateKind {
        self.payload.kind()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_event_carries_fields() {
        let ev = UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20);
        assert_eq!(ev.handle, 1);
        assert_eq!(ev.timestamp_ms, 1000);
        assert_eq!(ev.kind(), UpdateKind::Quote);
        match ev.payload {
            UpdatePayload::Quote(q) => {
                assert!((q.bid_price - 100.5).abs() < f64::EPSILON);
                assert!((q.ask_price - 100.6).abs() < f64::EPSILON);
                assert_eq!(q.bid_size, 10);
                assert_eq!(q.ask_size, 20);
            }
            other => panic!("expected quote payload, got {other:?}"),
        }
    }

    #[test]
    fn nan_price_is_malformed() {
        let ev = UpdateEvent::quote(1, 1000, f64::NAN, 100.6, 10, 20);
        assert!(!ev.payload.is_well_formed());

        let ev = UpdateEvent::trade(1, 1000, f64::INFINITY, 50, false);
        assert!(!ev.payload.is_well_formed());
    }

    #[test]
    fn negative_price_is_malformed() {
        let ev = UpdateEvent::trade(1, 1000, -0.01, 50, false);
        assert!(!ev.payload.is_well_formed());
    }

    #[test]
    fn ordinary_events_are_well_formed() {
        assert!(UpdateEvent::quote(1, 1, 100.5, 100.6, 10, 20)
            .payload
            .is_well_formed());
        assert!(UpdateEvent::trade(1, 1, 100.55, 50, true)
            .payload
            .is_well_formed());
        assert!(UpdateEvent::bar(
            1,
            1,
            BarUpdate {
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 1000,
            }
        )
        .payload
        .is_well_formed());
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(UpdateKind::Quote.as_str(), "quote");
        assert_eq!(UpdateKind::Trade.as_str(), "trade");
        assert_eq!(UpdateKind::Bar.as_str(), "bar");
    }
}
