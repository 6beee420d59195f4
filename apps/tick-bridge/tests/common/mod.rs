//! Shared test support for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use tick_bridge::{InstrumentDirectory, InstrumentMeta, SinkError, SnapshotSink};

/// Sink capturing every published (topic, payload) pair.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the captured publishes.
    pub fn published(&self) -> Arc<Mutex<Vec<(String, Vec<u8>)>>> {
        Arc::clone(&self.published)
    }
}

impl SnapshotSink for CaptureSink {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Build a directory with sequential handles starting at 1.
pub fn directory_with(symbols: &[&str]) -> Arc<InstrumentDirectory> {
    let directory = Arc::new(InstrumentDirectory::new());
    for (index, symbol) in symbols.iter().enumerate() {
        let handle = u32::try_from(index + 1).unwrap();
        directory.register(
            handle,
            InstrumentMeta::new((*symbol).to_string(), 0, "SMART".to_string()),
        );
    }
    directory
}

/// Poll `condition` until it holds or `deadline` elapses.
pub fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
