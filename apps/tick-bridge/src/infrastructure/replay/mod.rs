//! CSV Tick Replay
//!
//! Feeds recorded ticks through the same [`MarketDataHandler`] the live
//! source adapter drives, so the whole pipeline can be exercised without an
//! upstream session. Used by integration tests and by the binary when
//! `BRIDGE_REPLAY_FILE` is set.
//!
//! # File format
//!
//! A headered CSV with one row per tick. `kind` selects which columns are
//! read; unused columns stay empty.
//!
//! ```csv
//! kind,instrument,time,bid,ask,bid_size,ask_size,price,size,past_limit,open,high,low,close,volume
//! quote,AAPL,2024-01-02T14:30:00.000Z,100.5,100.6,10,20,,,,,,,,
//! trade,AAPL,2024-01-02T14:30:00.500Z,,,,,100.55,50,false,,,,,
//! bar,SPY,2024-01-02T14:30:05Z,,,,,,,,500.0,501.5,499.0,500.75,12000
//! ```
//!
//! `time` accepts RFC 3339 or raw epoch milliseconds.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::application::ports::MarketDataHandler;
use crate::domain::directory::InstrumentDirectory;
use crate::domain::event::BarUpdate;

// =============================================================================
// Error Type
// =============================================================================

/// Error reading or parsing a replay file.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The file could not be read or parsed as CSV.
    #[error("replay file error: {0}")]
    Csv(#[from] csv::Error),

    /// A row carried an unparseable timestamp.
    #[error("invalid timestamp {0:?} (expected RFC 3339 or epoch millis)")]
    Timestamp(String),

    /// A row carried an unknown `kind`.
    #[error("unknown tick kind {0:?}")]
    UnknownKind(String),
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    kind: String,
    instrument: String,
    time: String,
    bid: Option<f64>,
    ask: Option<f64>,
    bid_size: Option<u32>,
    ask_size: Option<u32>,
    price: Option<f64>,
    size: Option<u32>,
    past_limit: Option<bool>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
}

/// Tallies from one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Quote rows dispatched.
    pub quotes: u64,
    /// Trade rows dispatched.
    pub trades: u64,
    /// Bar rows dispatched.
    pub bars: u64,
    /// Rows skipped (unregistered instrument or missing columns).
    pub skipped: u64,
}

impl ReplayStats {
    /// Total rows dispatched to the handler.
    #[must_use]
    pub const fn dispatched(&self) -> u64 {
        self.quotes + self.trades + self.bars
    }
}

// =============================================================================
// Replay Feed
// =============================================================================

/// Replays a CSV tick file through a [`MarketDataHandler`].
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    path: PathBuf,
}

impl ReplayFeed {
    /// Create a feed for a CSV file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the replay file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay every row through `handler`, resolving instruments against
    /// `directory`. Rows for unregistered instruments are skipped and
    /// counted, matching how a live source would be ignored for handles the
    /// bridge never subscribed.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] on unreadable files, malformed CSV, bad
    /// timestamps, or unknown kinds.
    pub fn run(
        &self,
        directory: &InstrumentDirectory,
        handler: &dyn MarketDataHandler,
    ) -> Result<ReplayStats, ReplayError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut stats = ReplayStats::default();

        for row in reader.deserialize::<ReplayRecord>() {
            let record = row?;

            let Some(handle) = directory.handle_of(&record.instrument) else {
                tracing::debug!(instrument = %record.instrument, "replay row for unregistered instrument");
                stats.skipped += 1;
                continue;
            };

            let timestamp_ms = parse_time(&record.time)?;

            match record.kind.as_str() {
                "quote" => {
                    let (Some(bid), Some(ask)) = (record.bid, record.ask) else {
                        stats.skipped += 1;
                        continue;
                    };
                    handler.on_quote(
                        handle,
                        timestamp_ms,
                        bid,
                        ask,
                        record.bid_size.unwrap_or(0),
                        record.ask_size.unwrap_or(0),
                    );
                    stats.quotes += 1;
                }
                "trade" => {
                    let (Some(price), Some(size)) = (record.price, record.size) else {
                        stats.skipped += 1;
                        continue;
                    };
                    handler.on_trade(
                        handle,
                        timestamp_ms,
                        price,
                        size,
                        record.past_limit.unwrap_or(false),
                    );
                    stats.trades += 1;
                }
                "bar" => {
                    let (Some(open), Some(high), Some(low), Some(close)) =
                        (record.open, record.high, record.low, record.close)
                    else {
                        stats.skipped += 1;
                        continue;
                    };
                    handler.on_bar(
                        handle,
                        timestamp_ms,
                        BarUpdate {
                            open,
                            high,
                            low,
                            close,
                            volume: record.volume.unwrap_or(0),
                        },
                    );
                    stats.bars += 1;
                }
                other => return Err(ReplayError::UnknownKind(other.to_string())),
            }
        }

        tracing::info!(
            quotes = stats.quotes,
            trades = stats.trades,
            bars = stats.bars,
            skipped = stats.skipped,
            "replay complete"
        );
        Ok(stats)
    }
}

fn parse_time(raw: &str) -> Result<i64, ReplayError> {
    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(millis);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| ReplayError::Timestamp(raw.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
