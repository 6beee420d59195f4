//! Sink Reconnection Policy
//!
//! Exponential backoff with jitter for re-establishing the pub/sub sink
//! connection. The policy only computes delays; it never sleeps, so the
//! consumer drain loop is free to check a deadline and keep draining while
//! the sink is down.

use std::time::Duration;

use rand::Rng;

/// Configuration for sink reconnection backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Ceiling for the backoff delay.
    pub max_delay: Duration,
    /// Backoff multiplier applied per attempt (2.0 doubles each time).
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// Stateful backoff tracker for sink reconnection.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy from a configuration.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt, or `None` once the attempt
    /// budget is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
            return None;
        }

        let base = self.base_delay();
        self.attempts += 1;
        Some(self.apply_jitter(base))
    }

    /// Forget past failures after a successful reconnect.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }

    /// Backoff delay for the current attempt count, capped at `max_delay`.
    fn base_delay(&self) -> Duration {
        let attempts = i32::try_from(self.attempts).unwrap_or(i32::MAX);
        let scaled =
            self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(attempts);
        let capped = scaled.min(self.config.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.config.max_delay
        }
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }

        let base = delay.as_secs_f64();
        let spread = base * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((base + jitter).max(0.001))
    }
}

// =============================================================================
// Tests
// =============================================================================
