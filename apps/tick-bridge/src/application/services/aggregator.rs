//! State Aggregator
//!
//! Runs on the consumer thread and exclusively owns the per-instrument
//! snapshot map, so no other thread ever observes a half-merged snapshot.
//!
//! Handles are routed to instruments through a consumer-local cache backed
//! by the directory: several handles may feed one instrument (separate
//! quote and trade subscriptions), and all of them merge into the same
//! snapshot. The cache is cleared on reset so a re-established session can
//! remap handles.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::services::counters::PipelineCounters;
use crate::domain::directory::InstrumentDirectory;
use crate::domain::event::{
    BarUpdate, InstrumentHandle, InstrumentId, UpdateEvent, UpdatePayload,
};
use crate::domain::snapshot::{InstrumentSnapshot, PublishPolicy};
use crate::infrastructure::metrics;

// =============================================================================
// Merge Outcome
// =============================================================================

/// Result of merging one event.
#[derive(Debug)]
pub enum MergeOutcome<'a> {
    /// The snapshot satisfied the publish policy after this merge.
    Ready(&'a InstrumentSnapshot),
    /// Merged, but the snapshot is not yet publish-ready.
    Pending,
    /// A bar, which bypasses aggregation and publishes immediately.
    Bar {
        /// Instrument the bar belongs to.
        instrument: InstrumentId,
        /// Source timestamp of the bar, epoch milliseconds.
        timestamp_ms: i64,
        /// Bar fields.
        bar: BarUpdate,
    },
    /// The event could not be attributed to an instrument.
    Discarded,
}

// =============================================================================
// Aggregator
// =============================================================================

/// Per-instrument merge state machine.
pub struct Aggregator {
    snapshots: HashMap<InstrumentId, InstrumentSnapshot>,
    route: HashMap<InstrumentHandle, InstrumentId>,
    directory: Arc<InstrumentDirectory>,
    policy: PublishPolicy,
    counters: Arc<PipelineCounters>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("instruments", &self.snapshots.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new(
        directory: Arc<InstrumentDirectory>,
        policy: PublishPolicy,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            snapshots: HashMap::new(),
            route: HashMap::new(),
            directory,
            policy,
            counters,
        }
    }

    /// Merge one event into its instrument snapshot.
    ///
    /// Publish-ready fires on every merge that satisfies the policy, not
    /// just the first completion - downstream always sees the latest
    /// complete state.
    pub fn apply(&mut self, event: &UpdateEvent) -> MergeOutcome<'_> {
        if !self.route.contains_key(&event.handle) {
            let Some(meta) = self.directory.resolve(event.handle) else {
                // The producer validated the handle before enqueue, so this
                // only happens if it was unregistered while in flight.
                self.counters.record_unresolved();
                tracing::debug!(handle = event.handle, "event handle no longer registered");
                return MergeOutcome::Discarded;
            };
            self.snapshots
                .entry(meta.instrument.clone())
                .or_insert_with(|| {
                    InstrumentSnapshot::new(
                        meta.instrument.clone(),
                        meta.contract_id,
                        meta.exchange.clone(),
                    )
                });
            self.route.insert(event.handle, meta.instrument);
        }

        let Some(instrument) = self.route.get(&event.handle) else {
            return MergeOutcome::Discarded;
        };
        let Some(snapshot) = self.snapshots.get_mut(instrument) else {
            return MergeOutcome::Discarded;
        };

        match &event.payload {
            UpdatePayload::Quote(quote) => snapshot.apply_quote(event.timestamp_ms, quote),
            UpdatePayload::Trade(trade) => snapshot.apply_trade(event.timestamp_ms, trade),
            UpdatePayload::Bar(bar) => {
                return MergeOutcome::Bar {
                    instrument: snapshot.instrument.clone(),
                    timestamp_ms: event.timestamp_ms,
                    bar: *bar,
                };
            }
        }
        self.counters.record_merged();
        metrics::record_event_merged(event.kind());

        if snapshot.is_publish_ready(self.policy) {
            MergeOutcome::Ready(snapshot)
        } else {
            MergeOutcome::Pending
        }
    }

    /// Look up the current snapshot for an instrument.
    #[must_use]
    pub fn get(&self, instrument: &str) -> Option<&InstrumentSnapshot> {
        self.snapshots.get(instrument)
    }

    /// Clear one instrument's market data in place.
    ///
    /// Returns `false` if the instrument has never been seen.
    pub fn reset(&mut self, instrument: &str) -> bool {
        self.snapshots.get_mut(instrument).is_some_and(|snapshot| {
            snapshot.reset();
            true
        })
    }

    /// Clear all snapshots in place and drop the handle routes.
    ///
    /// Map entries survive so no reallocation happens when fresh data
    /// arrives; routes are re-resolved because a re-established session may
    /// assign different handles.
    pub fn reset_all(&mut self) {
        for snapshot in self.snapshots.values_mut() {
            snapshot.reset();
        }
        self.route.clear();
    }

    /// Number of instruments seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no instrument has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::domain::directory::InstrumentMeta;

    use super::*;

    fn aggregator_with(
        entries: &[(InstrumentHandle, &str)],
        policy: PublishPolicy,
    ) -> Aggregator {
        let directory = Arc::new(InstrumentDirectory::new());
        for (handle, symbol) in entries {
            directory.register(
                *handle,
                InstrumentMeta::new((*symbol).to_string(), 0, "SMART".to_string()),
            );
        }
        Aggregator::new(directory, policy, Arc::new(PipelineCounters::default()))
    }

    fn assert_pending(outcome: &MergeOutcome<'_>) {
        assert!(matches!(outcome, MergeOutcome::Pending), "got {outcome:?}");
    }

    #[test]
    fn quote_then_trade_becomes_ready() {
        let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteAndTrade);

        let outcome = agg.apply(&UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20));
        assert_pending(&outcome);

        match agg.apply(&UpdateEvent::trade(1, 1500, 100.55, 50, false)) {
            MergeOutcome::Ready(snapshot) => {
                assert_eq!(snapshot.instrument, "AAPL");
                assert!((snapshot.bid_price - 100.5).abs() < f64::EPSILON);
                assert!((snapshot.ask_price - 100.6).abs() < f64::EPSILON);
                assert!((snapshot.last_price - 100.55).abs() < f64::EPSILON);
                assert!(snapshot.have_quote && snapshot.have_trade);
            }
            other => panic!("expected ready snapshot, got {other:?}"),
        }
    }

    #[test]
    fn every_update_after_completion_is_ready_again() {
        let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteAndTrade);
        agg.apply(&UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20));
        agg.apply(&UpdateEvent::trade(1, 1500, 100.55, 50, false));

        // Continuous republishing: each further merge re-triggers.
        for ts in [2000, 2500, 3000] {
            let outcome = agg.apply(&UpdateEvent::quote(1, ts, 100.7, 100.8, 5, 5));
            assert!(matches!(outcome, MergeOutcome::Ready(_)), "ts {ts}");
        }
    }

    #[test]
    fn distinct_handles_merge_into_one_instrument() {
        // Quote stream on handle 1, trade stream on handle 10001.
        let mut agg =
            aggregator_with(&[(1, "AAPL"), (10_001, "AAPL")], PublishPolicy::QuoteAndTrade);

        agg.apply(&UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20));
        let outcome = agg.apply(&UpdateEvent::trade(10_001, 1500, 100.55, 50, false));

        assert!(matches!(outcome, MergeOutcome::Ready(_)));
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn instruments_do_not_cross_contaminate() {
        let mut agg = aggregator_with(&[(1, "AAPL"), (2, "SPY")], PublishPolicy::QuoteAndTrade);

        agg.apply(&UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20));
        agg.apply(&UpdateEvent::quote(2, 1001, 500.0, 500.1, 1, 1));
        agg.apply(&UpdateEvent::trade(2, 1002, 500.05, 5, false));

        let aapl = agg.get("AAPL").unwrap();
        assert!(!aapl.have_trade);
        assert!((aapl.bid_price - 100.5).abs() < f64::EPSILON);

        let spy = agg.get("SPY").unwrap();
        assert!(spy.have_quote && spy.have_trade);
        assert!((spy.last_price - 500.05).abs() < f64::EPSILON);
    }

    #[test]
    fn unregistered_handle_is_discarded() {
        let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteAndTrade);
        let outcome = agg.apply(&UpdateEvent::quote(42, 1000, 1.0, 1.1, 1, 1));
        assert!(matches!(outcome, MergeOutcome::Discarded));
        assert!(agg.is_empty());
    }

    #[test]
    fn bars_bypass_aggregation() {
        let mut agg = aggregator_with(&[(1, "SPY")], PublishPolicy::QuoteAndTrade);
        let bar = BarUpdate {
            open: 500.0,
            high: 501.0,
            low: 499.0,
            close: 500.5,
            volume: 1_000,
        };

        match agg.apply(&UpdateEvent::bar(1, 2000, bar)) {
            MergeOutcome::Bar {
                instrument,
                timestamp_ms,
                bar: out,
            } => {
                assert_eq!(instrument, "SPY");
                assert_eq!(timestamp_ms, 2000);
                assert_eq!(out, bar);
            }
            other => panic!("expected bar outcome, got {other:?}"),
        }

        // The snapshot flags are untouched by bars.
        let snapshot = agg.get("SPY").unwrap();
        assert!(!snapshot.have_quote && !snapshot.have_trade);
    }

    #[test]
    fn reset_requires_a_fresh_pair_before_ready() {
        let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteAndTrade);
        agg.apply(&UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20));
        agg.apply(&UpdateEvent::trade(1, 1500, 100.55, 50, false));

        assert!(agg.reset("AAPL"));

        // A trade alone after reset must not be ready.
        let outcome = agg.apply(&UpdateEvent::trade(1, 2000, 101.0, 10, false));
        assert_pending(&outcome);

        // The fresh quote completes the pair again.
        let outcome = agg.apply(&UpdateEvent::quote(1, 2500, 101.1, 101.2, 5, 5));
        assert!(matches!(outcome, MergeOutcome::Ready(_)));
    }

    #[test]
    fn reset_unknown_instrument_returns_false() {
        let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteAndTrade);
        assert!(!agg.reset("MSFT"));
    }

    #[test]
    fn reset_all_clears_state_but_keeps_entries() {
        let mut agg = aggregator_with(&[(1, "AAPL"), (2, "SPY")], PublishPolicy::QuoteAndTrade);
        agg.apply(&UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20));
        agg.apply(&UpdateEvent::quote(2, 1000, 500.0, 500.1, 1, 1));

        agg.reset_all();

        assert_eq!(agg.len(), 2);
        assert!(!agg.get("AAPL").unwrap().have_quote);
        assert!(!agg.get("SPY").unwrap().have_quote);
    }

    #[test]
    fn quote_only_policy_is_ready_from_first_quote() {
        let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteOnly);
        let outcome = agg.apply(&UpdateEvent::quote(1, 1000, 100.5, 100.6, 10, 20));
        assert!(matches!(outcome, MergeOutcome::Ready(_)));

        // A trade alone still is not enough.
        let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteOnly);
        let outcome = agg.apply(&UpdateEvent::trade(1, 1000, 100.55, 50, false));
        assert_pending(&outcome);
    }

    proptest! {
        #[test]
        fn last_quote_always_wins(timestamps in prop::collection::vec(0i64..1_000_000, 1..50)) {
            let mut agg = aggregator_with(&[(1, "AAPL")], PublishPolicy::QuoteAndTrade);

            for (i, ts) in timestamps.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let bid = 100.0 + i as f64;
                agg.apply(&UpdateEvent::quote(1, *ts, bid, bid + 0.1, 1, 1));
            }

            let snapshot = agg.get("AAPL").unwrap();
            let last = timestamps.len() - 1;
            #[allow(clippy::cast_precision_loss)]
            let expected_bid = 100.0 + last as f64;
            prop_assert_eq!(snapshot.quote_timestamp_ms, timestamps[last]);
            prop_assert!((snapshot.bid_price - expected_bid).abs() < f64::EPSILON);
        }
    }
}
