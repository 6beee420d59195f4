//! Instrument Directory
//!
//! Maps opaque, source-assigned subscription handles to instrument
//! metadata. Entries are established when a subscription is confirmed and
//! removed only on full unsubscribe - never on reconnect.
//!
//! # Concurrency
//!
//! The directory sits off the event-delivery critical path: the producer
//! performs read-mostly lookups while the low-frequency subscription
//! management path is the sole writer. A reader-writer lock covers both,
//! eliminating the unprotected-map race class by construction.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::event::{InstrumentHandle, InstrumentId};

// =============================================================================
// Instrument Metadata
// =============================================================================

/// Instrument-scoped attributes registered at subscription time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentMeta {
    /// Canonical instrument identifier.
    pub instrument: InstrumentId,
    /// Upstream contract identifier.
    pub contract_id: i64,
    /// Listing exchange.
    pub exchange: String,
}

impl InstrumentMeta {
    /// Create metadata for an instrument.
    #[must_use]
    pub const fn new(instrument: InstrumentId, contract_id: i64, exchange: String) -> Self {
        Self {
            instrument,
            contract_id,
            exchange,
        }
    }
}

// =============================================================================
// Instrument Directory
// =============================================================================

/// Handle to instrument metadata map.
#[derive(Debug, Default)]
pub struct InstrumentDirectory {
    entries: RwLock<HashMap<InstrumentHandle, InstrumentMeta>>,
}

impl InstrumentDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle, returning the previous metadata if it was already
    /// registered.
    pub fn register(
        &self,
        handle: InstrumentHandle,
        meta: InstrumentMeta,
    ) -> Option<InstrumentMeta> {
        self.entries.write().insert(handle, meta)
    }

    /// Remove a handle on full unsubscribe.
    pub fn unregister(&self, handle: InstrumentHandle) -> Option<InstrumentMeta> {
        self.entries.write().remove(&handle)
    }

    /// Resolve a handle to its instrument metadata.
    #[must_use]
    pub fn resolve(&self, handle: InstrumentHandle) -> Option<InstrumentMeta> {
        self.entries.read().get(&handle).cloned()
    }

    /// Whether a handle is currently registered.
    #[must_use]
    pub fn contains(&self, handle: InstrumentHandle) -> bool {
        self.entries.read().contains_key(&handle)
    }

    /// Reverse lookup: first handle registered for an instrument.
    ///
    /// Linear scan; intended for the subscription-management and replay
    /// paths, not per-event routing.
    #[must_use]
    pub fn handle_of(&self, instrument: &str) -> Option<InstrumentHandle> {
        self.entries
            .read()
            .iter()
            .find(|(_, meta)| meta.instrument == instrument)
            .map(|(handle, _)| *handle)
    }

    /// All registered handles, for re-subscription after a reconnect.
    #[must_use]
    pub fn handles(&self) -> Vec<InstrumentHandle> {
        self.entries.read().keys().copied().collect()
    }

    /// Number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the directory has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
