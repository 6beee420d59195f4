//! Instrument Snapshot State
//!
//! The aggregated, publishable state for one instrument: the most recent
//! quote, the most recent trade, and instrument-scoped attributes. A
//! snapshot is exclusively owned by the aggregator on the consumer thread,
//! so merges are never observed half-applied.
//!
//! # State machine
//!
//! Two flags track which halves have been observed since the last reset:
//! `have_quote` and `have_trade`. A quote overwrites the quote fields and
//! timestamp; a trade overwrites the trade fields and timestamp. The
//! snapshot is publish-ready whenever the configured [`PublishPolicy`] is
//! satisfied - on every merge, not just the first completion, so the latest
//! complete state is republished on each new fact.

use crate::domain::event::{InstrumentId, QuoteUpdate, TradeUpdate};

// =============================================================================
// Publish Policy
// =============================================================================

/// When a snapshot becomes eligible for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishPolicy {
    /// Publish only once both a quote and a trade have been observed.
    #[default]
    QuoteAndTrade,
    /// Publish from the first quote onward; trades enrich the snapshot.
    QuoteOnly,
}

impl PublishPolicy {
    /// Parse a policy from a configuration string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "quote_only" | "quote-only" => Self::QuoteOnly,
            _ => Self::QuoteAndTrade,
        }
    }

    /// Get the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteAndTrade => "quote_and_trade",
            Self::QuoteOnly => "quote_only",
        }
    }
}

// =============================================================================
// Instrument Snapshot
// =============================================================================

/// Aggregated state for one instrument.
///
/// Created on the first event for an instrument and mutated in place for
/// the process lifetime; [`InstrumentSnapshot::reset`] clears the market
/// data without discarding the entry or its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSnapshot {
    /// Canonical instrument identifier.
    pub instrument: InstrumentId,
    /// Upstream contract identifier.
    pub contract_id: i64,
    /// Listing exchange.
    pub exchange: String,

    /// Best bid price.
    pub bid_price: f64,
    /// Best ask price.
    pub ask_price: f64,
    /// Size at the bid.
    pub bid_size: u32,
    /// Size at the ask.
    pub ask_size: u32,
    /// Timestamp of the most recent quote, epoch milliseconds.
    pub quote_timestamp_ms: i64,
    /// Whether a quote has been observed since the last reset.
    pub have_quote: bool,

    /// Last trade price.
    pub last_price: f64,
    /// Last trade size.
    pub last_size: u32,
    /// Whether the last trade printed past the limit.
    pub past_limit: bool,
    /// Timestamp of the most recent trade, epoch milliseconds.
    pub trade_timestamp_ms: i64,
    /// Whether a trade has been observed since the last reset.
    pub have_trade: bool,
}

impl InstrumentSnapshot {
    /// Create an empty snapshot for an instrument.
    #[must_use]
    pub const fn new(instrument: InstrumentId, contract_id: i64, exchange: String) -> Self {
        Self {
            instrument,
            contract_id,
            exchange,
            bid_price: 0.0,
            ask_price: 0.0,
            bid_size: 0,
            ask_size: 0,
            quote_timestamp_ms: 0,
            have_quote: false,
            last_price: 0.0,
            last_size: 0,
            past_limit: false,
            trade_timestamp_ms: 0,
            have_trade: false,
        }
    }

    /// Overwrite the quote half with a newer quote.
    pub const fn apply_quote(&mut self, timestamp_ms: i64, quote: &QuoteUpdate) {
        self.bid_price = quote.bid_price;
        self.ask_price = quote.ask_price;
        self.bid_size = quote.bid_size;
        self.ask_size = quote.ask_size;
        self.quote_timestamp_ms = timestamp_ms;
        self.have_quote = true;
    }

    /// Overwrite the trade half with a newer trade.
    pub const fn apply_trade(&mut self, timestamp_ms: i64, trade: &TradeUpdate) {
        self.last_price = trade.price;
        self.last_size = trade.size;
        self.past_limit = trade.past_limit;
        self.trade_timestamp_ms = timestamp_ms;
        self.have_trade = true;
    }

    /// Clear market data in place, keeping the instrument identity.
    ///
    /// Invoked when the upstream session is re-established and local state
    /// may be stale. A reset snapshot behaves exactly like a cold-started
    /// one: nothing publishes until fresh updates satisfy the policy again.
    pub fn reset(&mut self) {
        self.bid_price = 0.0;
        self.ask_price = 0.0;
        self.bid_size = 0;
        self.ask_size = 0;
        self.quote_timestamp_ms = 0;
        self.have_quote = false;
        self.last_price = 0.0;
        self.last_size = 0;
        self.past_limit = false;
        self.trade_timestamp_ms = 0;
        self.have_trade = false;
    }

    /// Whether this snapshot satisfies the given publish policy.
    #[must_use]
    pub const fn is_publish_ready(&self, policy: PublishPolicy) -> bool {
        match policy {
            PublishPolicy::QuoteAndTrade => self.have_quote && self.have_trade,
            PublishPolicy::QuoteOnly => self.have_quote,
        }
    }

    /// Most recent of the quote and trade timestamps.
    #[must_use]
    pub fn latest_timestamp_ms(&self) -> i64 {
        self.quote_timestamp_ms.max(self.trade_timestamp_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
