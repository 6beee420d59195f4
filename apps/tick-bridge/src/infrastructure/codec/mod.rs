//! Snapshot Payload Codec
//!
//! Pure encoders from aggregated state to the JSON wire payload. Encoding
//! writes into a caller-provided buffer that is cleared and reused, so the
//! steady-state publish path performs no fresh allocations.
//!
//! # Snapshot schema
//!
//! ```json
//! {
//!   "instrument": "AAPL",
//!   "conId": 265598,
//!   "timestamp": 1700000000500,
//!   "price": {"bid": 171.55, "ask": 171.57, "last": 171.56},
//!   "size": {"bid": 100, "ask": 200, "last": 50},
//!   "timestamps": {"quote": 1700000000000, "trade": 1700000000500},
//!   "exchange": "NASDAQ",
//!   "tickAttrib": {"pastLimit": false}
//! }
//! ```
//!
//! The top-level `timestamp` is the most recent of the quote and trade
//! timestamps. Complete snapshots spare downstream consumers any merge
//! logic of their own.

use serde::Serialize;

use crate::domain::event::BarUpdate;
use crate::domain::snapshot::InstrumentSnapshot;

// =============================================================================
// Error Type
// =============================================================================

/// Error encoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Wire Structures
// =============================================================================

#[derive(Serialize)]
struct PriceBlock {
    bid: f64,
    ask: f64,
    last: f64,
}

#[derive(Serialize)]
struct SizeBlock {
    bid: u32,
    ask: u32,
    last: u32,
}

#[derive(Serialize)]
struct TimestampBlock {
    quote: i64,
    trade: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TickAttribBlock {
    past_limit: bool,
}

#[derive(Serialize)]
struct SnapshotPayload<'a> {
    instrument: &'a str,
    #[serde(rename = "conId")]
    con_id: i64,
    timestamp: i64,
    price: PriceBlock,
    size: SizeBlock,
    timestamps: TimestampBlock,
    exchange: &'a str,
    #[serde(rename = "tickAttrib")]
    tick_attrib: TickAttribBlock,
}

#[derive(Serialize)]
struct BarPayload<'a> {
    instrument: &'a str,
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

// =============================================================================
// Encoders
// =============================================================================

/// Encode a complete instrument snapshot into `buf`.
///
/// The buffer is cleared first and holds the full payload on return.
///
/// # Errors
///
/// Returns a [`CodecError`] if JSON serialization fails; the caller
/// discards the item and continues.
pub fn encode_snapshot(
    snapshot: &InstrumentSnapshot,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    buf.clear();
    let payload = SnapshotPayload {
        instrument: &snapshot.instrument,
        con_id: snapshot.contract_id,
        timestamp: snapshot.latest_timestamp_ms(),
        price: PriceBlock {
            bid: snapshot.bid_price,
            ask: snapshot.ask_price,
            last: snapshot.last_price,
        },
        size: SizeBlock {
            bid: snapshot.bid_size,
            ask: snapshot.ask_size,
            last: snapshot.last_size,
        },
        timestamps: TimestampBlock {
            quote: snapshot.quote_timestamp_ms,
            trade: snapshot.trade_timestamp_ms,
        },
        exchange: &snapshot.exchange,
        tick_attrib: TickAttribBlock {
            past_limit: snapshot.past_limit,
        },
    };
    serde_json::to_writer(&mut *buf, &payload)?;
    Ok(())
}

/// Encode a bar into `buf`.
///
/// # Errors
///
/// Returns a [`CodecError`] if JSON serialization fails.
pub fn encode_bar(
    instrument: &str,
    timestamp_ms: i64,
    bar: &BarUpdate,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    buf.clear();
    let payload = BarPayload {
        instrument,
        timestamp: timestamp_ms,
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
    };
    serde_json::to_writer(&mut *buf, &payload)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::domain::event::{QuoteUpdate, TradeUpdate};

    use super::*;

    fn populated_snapshot() -> InstrumentSnapshot {
        let mut snap =
            InstrumentSnapshot::new("AAPL".to_string(), 265_598, "NASDAQ".to_string());
        snap.apply_quote(
            1_700_000_000_000,
            &QuoteUpdate {
                bid_price: 171.55,
                ask_price: 171.57,
                bid_size: 100,
                ask_size: 200,
            },
        );
        snap.apply_trade(
            1_700_000_000_500,
            &TradeUpdate {
                price: 171.56,
                size: 50,
                past_limit: false,
            },
        );
        snap
    }

    #[test]
    fn snapshot_payload_matches_schema() {
        let mut buf = Vec::new();
        encode_snapshot(&populated_snapshot(), &mut buf).unwrap();

        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["instrument"], "AAPL");
        assert_eq!(value["conId"], 265_598);
        assert_eq!(value["timestamp"], 1_700_000_000_500_i64);
        assert_eq!(value["price"]["bid"], 171.55);
        assert_eq!(value["price"]["ask"], 171.57);
        assert_eq!(value["price"]["last"], 171.56);
        assert_eq!(value["size"]["bid"], 100);
        assert_eq!(value["size"]["ask"], 200);
        assert_eq!(value["size"]["last"], 50);
        assert_eq!(value["timestamps"]["quote"], 1_700_000_000_000_i64);
        assert_eq!(value["timestamps"]["trade"], 1_700_000_000_500_i64);
        assert_eq!(value["exchange"], "NASDAQ");
        assert_eq!(value["tickAttrib"]["pastLimit"], false);
    }

    #[test]
    fn top_level_timestamp_uses_latest_half() {
        let mut snap = populated_snapshot();
        snap.apply_quote(
            1_700_000_001_000,
            &QuoteUpdate {
                bid_price: 171.60,
                ask_price: 171.62,
                bid_size: 10,
                ask_size: 10,
            },
        );

        let mut buf = Vec::new();
        encode_snapshot(&snap, &mut buf).unwrap();

        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_001_000_i64);
    }

    #[test]
    fn empty_snapshot_still_encodes() {
        let snap = InstrumentSnapshot::new("TEST".to_string(), 0, String::new());
        let mut buf = Vec::new();
        encode_snapshot(&snap, &mut buf).unwrap();

        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["instrument"], "TEST");
        assert_eq!(value["timestamp"], 0);
    }

    #[test]
    fn buffer_is_reused_across_encodes() {
        let mut buf = b"stale contents".to_vec();
        encode_snapshot(&populated_snapshot(), &mut buf).unwrap();

        // No residue from the previous contents.
        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["instrument"], "AAPL");
    }

    #[test]
    fn bar_payload_matches_schema() {
        let bar = BarUpdate {
            open: 500.0,
            high: 501.5,
            low: 499.0,
            close: 500.75,
            volume: 12_000,
        };
        let mut buf = Vec::new();
        encode_bar("SPY", 1_700_000_002_000, &bar, &mut buf).unwrap();

        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["instrument"], "SPY");
        assert_eq!(value["timestamp"], 1_700_000_002_000_i64);
        assert_eq!(value["open"], 500.0);
        assert_eq!(value["high"], 501.5);
        assert_eq!(value["low"], 499.0);
        assert_eq!(value["close"], 500.75);
        assert_eq!(value["volume"], 12_000);
    }
}
