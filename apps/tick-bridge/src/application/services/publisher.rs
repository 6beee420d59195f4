//! Publisher
//!
//! Consumer-side delivery of publish-ready state: encodes a snapshot or
//! bar, derives its topic deterministically from the instrument identifier,
//! and hands the payload to the sink port.
//!
//! A sink failure is returned to the drain loop, which logs and counts it -
//! never retried synchronously, so a stuck sink cannot back the queue up.
//! The topic and payload buffers are reused across publishes.

use std::fmt::Write as _;

use crate::application::ports::{SinkError, SnapshotSink};
use crate::domain::event::BarUpdate;
use crate::domain::snapshot::InstrumentSnapshot;
use crate::infrastructure::codec::{self, CodecError};

// =============================================================================
// Error Type
// =============================================================================

/// Error publishing one item.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The payload could not be encoded (structural: item discarded).
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The sink rejected or failed the publish (transient: counted).
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

// =============================================================================
// Publisher
// =============================================================================

/// Encodes publish-ready state and writes it to the sink.
pub struct Publisher {
    sink: Box<dyn SnapshotSink + Send>,
    topic_prefix: String,
    bar_topic_prefix: String,
    topic: String,
    payload: Vec<u8>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topic_prefix", &self.topic_prefix)
            .field("bar_topic_prefix", &self.bar_topic_prefix)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Create a publisher over a sink with the given topic prefixes.
    #[must_use]
    pub fn new(
        sink: Box<dyn SnapshotSink + Send>,
        topic_prefix: String,
        bar_topic_prefix: String,
    ) -> Self {
        Self {
            sink,
            topic_prefix,
            bar_topic_prefix,
            topic: String::new(),
            payload: Vec::new(),
        }
    }

    /// Publish a complete snapshot to `<prefix>:<instrument>`.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] on codec or sink failure; the caller logs
    /// and counts it and keeps draining.
    pub fn publish_snapshot(&mut self, snapshot: &InstrumentSnapshot) -> Result<(), PublishError> {
        self.topic.clear();
        let _ = write!(self.topic, "{}:{}", self.topic_prefix, snapshot.instrument);

        codec::encode_snapshot(snapshot, &mut self.payload)?;
        self.sink.publish(&self.topic, &self.payload)?;
        Ok(())
    }

    /// Publish a bar to `<bar prefix>:<instrument>`.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] on codec or sink failure.
    pub fn publish_bar(
        &mut self,
        instrument: &str,
        timestamp_ms: i64,
        bar: &BarUpdate,
    ) -> Result<(), PublishError> {
        self.topic.clear();
        let _ = write!(self.topic, "{}:{}", self.bar_topic_prefix, instrument);

        codec::encode_bar(instrument, timestamp_ms, bar, &mut self.payload)?;
        self.sink.publish(&self.topic, &self.payload)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
