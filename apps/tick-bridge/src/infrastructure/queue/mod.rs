//! Transfer Queue
//!
//! The bounded, lock-free handoff between the producer (source callback
//! thread) and the consumer (drain thread). Capacity is fixed at
//! construction and never resized.
//!
//! # Overflow policy
//!
//! Drop-newest-on-full, with a counter. A stale partial quote is worthless
//! once superseded, and blocking the producer would violate the core
//! invariant that source callbacks complete in bounded time. No blocking
//! variants exist.
//!
//! # Ordering
//!
//! With one producer and one consumer the queue is FIFO, so update order
//! per instrument is preserved end to end. No ordering is promised across
//! instruments, and none is needed.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

/// Bounded lock-free queue with a drop-newest overflow counter.
#[derive(Debug)]
pub struct TransferQueue<T> {
    inner: ArrayQueue<T>,
    dropped: AtomicU64,
}

impl<T> TransferQueue<T> {
    /// Create a queue with a fixed capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer a value without blocking.
    ///
    /// Returns `false` if the queue is full; the value is dropped and the
    /// drop counter incremented. Never waits on the consumer.
    pub fn try_push(&self, value: T) -> bool {
        if self.inner.push(value).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Take the oldest value, if any.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Current number of queued values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Fixed capacity set at construction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Total values dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
