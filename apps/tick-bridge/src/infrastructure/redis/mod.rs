//! Redis Pub/Sub Sink Adapter
//!
//! Implements the [`SnapshotSink`] port over a synchronous Redis
//! connection (`PUBLISH <topic> <payload>`). The connection lives on the
//! consumer thread; delivery is at-most-once by design.
//!
//! # Failure handling
//!
//! A failed publish marks the connection dead, schedules the next
//! reconnection attempt via the backoff policy, and returns immediately -
//! the drain loop must keep consuming events while the sink is down.
//! Reconnection happens lazily on a later publish once the backoff
//! deadline has passed; the adapter never sleeps.

pub mod reconnect;

use std::time::Instant;

use crate::application::ports::{SinkError, SnapshotSink};

pub use reconnect::{ReconnectConfig, ReconnectPolicy};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Redis sink.
#[derive(Debug, Clone)]
pub struct RedisSinkConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379/`.
    pub url: String,
    /// Backoff policy for re-establishing a lost connection.
    pub reconnect: ReconnectConfig,
}

impl RedisSinkConfig {
    /// Create a configuration with default backoff for a URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// =============================================================================
// Redis Sink
// =============================================================================

/// Redis pub/sub implementation of the [`SnapshotSink`] port.
pub struct RedisSink {
    client: redis::Client,
    connection: Option<redis::Connection>,
    policy: ReconnectPolicy,
    next_attempt_at: Option<Instant>,
}

impl std::fmt::Debug for RedisSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSink")
            .field("connected", &self.connection.is_some())
            .field("attempts", &self.policy.attempts())
            .finish_non_exhaustive()
    }
}

impl RedisSink {
    /// Connect to Redis and verify the connection with a `PING`.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the URL is invalid or the server is
    /// unreachable. Startup is the only place a sink failure is fatal.
    pub fn connect(config: RedisSinkConfig) -> Result<Self, SinkError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let mut connection = client
            .get_connection()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        redis::cmd("PING")
            .query::<String>(&mut connection)
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            connection: Some(connection),
            policy: ReconnectPolicy::new(config.reconnect),
            next_attempt_at: None,
        })
    }

    /// Whether a live connection is currently held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Force an immediate reconnection attempt, ignoring the backoff
    /// deadline. Supervisor hook for out-of-band recovery.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the server is still unreachable.
    pub fn reconnect(&mut self) -> Result<(), SinkError> {
        self.next_attempt_at = None;
        self.establish()
    }

    /// Re-establish the connection if the backoff deadline has passed.
    fn try_lazy_reconnect(&mut self) -> Result<(), SinkError> {
        if !self.policy.should_retry() {
            return Err(SinkError::NotConnected);
        }
        match self.next_attempt_at {
            Some(deadline) if Instant::now() < deadline => Err(SinkError::NotConnected),
            _ => self.establish(),
        }
    }

    fn establish(&mut self) -> Result<(), SinkError> {
        match self.client.get_connection() {
            Ok(connection) => {
                tracing::info!(
                    attempts = self.policy.attempts(),
                    "Redis sink connection re-established"
                );
                self.connection = Some(connection);
                self.policy.reset();
                self.next_attempt_at = None;
                Ok(())
            }
            Err(e) => {
                self.schedule_next_attempt();
                Err(SinkError::Transport(e.to_string()))
            }
        }
    }

    fn mark_disconnected(&mut self) {
        self.connection = None;
        self.schedule_next_attempt();
    }

    fn schedule_next_attempt(&mut self) {
        self.next_attempt_at = self
            .policy
            .next_delay()
            .map(|delay| Instant::now() + delay);
        if self.next_attempt_at.is_none() {
            tracing::error!(
                attempts = self.policy.attempts(),
                "Redis sink reconnect attempts exhausted"
            );
        }
    }
}

impl SnapshotSink for RedisSink {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        if self.connection.is_none() {
            self.try_lazy_reconnect()?;
        }

        let Some(connection) = self.connection.as_mut() else {
            return Err(SinkError::NotConnected);
        };

        // PUBLISH returns the number of receivers; zero is still a success
        // for an at-most-once bus.
        match redis::cmd("PUBLISH")
            .arg(topic)
            .arg(payload)
            .query::<i64>(connection)
        {
            Ok(_) => Ok(()),
            Err(e) => {
                self.mark_disconnected();
                Err(SinkError::Transport(e.to_string()))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
