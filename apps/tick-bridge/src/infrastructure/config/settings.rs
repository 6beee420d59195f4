//! Bridge Configuration Settings
//!
//! Configuration types for the bridge, loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::pipeline::PipelineConfig;
use crate::domain::snapshot::PublishPolicy;

// =============================================================================
// Instrument Seeds
// =============================================================================

/// An instrument to register at startup, parsed from `BRIDGE_INSTRUMENTS`.
///
/// Entry format: `SYMBOL[:CONTRACT_ID[:EXCHANGE]]`, comma separated, e.g.
/// `AAPL:265598:NASDAQ,SPY:756733:ARCA,TSLA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSeed {
    /// Canonical instrument identifier.
    pub symbol: String,
    /// Upstream contract identifier (0 when unknown).
    pub contract_id: i64,
    /// Listing exchange.
    pub exchange: String,
}

impl InstrumentSeed {
    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let mut parts = entry.split(':');

        let symbol = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::InvalidInstrument(entry.to_string()))?;

        let contract_id = match parts.next() {
            None => 0,
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidInstrument(entry.to_string()))?,
        };

        let exchange = parts.next().map_or("SMART", str::trim);

        if parts.next().is_some() {
            return Err(ConfigError::InvalidInstrument(entry.to_string()));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            contract_id,
            exchange: exchange.to_string(),
        })
    }
}

// =============================================================================
// Settings Blocks
// =============================================================================

/// Redis sink settings.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Redis connection URL.
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/".to_string(),
        }
    }
}

/// Transfer queue and consumer loop settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Transfer queue capacity (slots, fixed at construction).
    pub queue_capacity: usize,
    /// Consumer sleep when the queue is empty.
    pub idle_backoff: Duration,
    /// Bound on draining the queue at shutdown.
    pub drain_timeout: Duration,
    /// Coalesce bursts: merge a batch, publish each instrument once.
    pub coalesce: bool,
    /// Maximum events merged per coalesced burst.
    pub burst_limit: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            idle_backoff: Duration::from_micros(100),
            drain_timeout: Duration::from_secs(5),
            coalesce: false,
            burst_limit: 256,
        }
    }
}

/// Snapshot publishing settings.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    /// When a snapshot becomes eligible for publishing.
    pub policy: PublishPolicy,
    /// Topic prefix for snapshots (`<prefix>:<instrument>`).
    pub topic_prefix: String,
    /// Topic prefix for bars.
    pub bar_topic_prefix: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            policy: PublishPolicy::QuoteAndTrade,
            topic_prefix: "ticks".to_string(),
            bar_topic_prefix: "bars".to_string(),
        }
    }
}

// =============================================================================
// Bridge Configuration
// =============================================================================

/// Complete bridge configuration.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Redis sink settings.
    pub redis: RedisSettings,
    /// Queue and consumer loop settings.
    pub pipeline: PipelineSettings,
    /// Publishing settings.
    pub publish: PublishSettings,
    /// Instruments registered at startup.
    pub instruments: Vec<InstrumentSeed>,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Optional CSV tick file to replay through the pipeline.
    pub replay_file: Option<PathBuf>,
}

impl BridgeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `BRIDGE_INSTRUMENTS` contains a malformed entry
    /// or a numeric variable fails to parse as its type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis = RedisSettings {
            url: std::env::var("BRIDGE_REDIS_URL")
                .unwrap_or_else(|_| RedisSettings::default().url),
        };

        let defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            queue_capacity: parse_env_usize("BRIDGE_QUEUE_CAPACITY", defaults.queue_capacity)?,
            idle_backoff: parse_env_duration_micros("BRIDGE_IDLE_BACKOFF_US", defaults.idle_backoff)?,
            drain_timeout: parse_env_duration_millis(
                "BRIDGE_DRAIN_TIMEOUT_MS",
                defaults.drain_timeout,
            )?,
            coalesce: parse_env_bool("BRIDGE_COALESCE", defaults.coalesce),
            burst_limit: parse_env_usize("BRIDGE_BURST_LIMIT", defaults.burst_limit)?,
        };

        let publish_defaults = PublishSettings::default();
        let publish = PublishSettings {
            policy: std::env::var("BRIDGE_PUBLISH_POLICY")
                .map(|s| PublishPolicy::from_str_case_insensitive(&s))
                .unwrap_or_default(),
            topic_prefix: std::env::var("BRIDGE_TOPIC_PREFIX")
                .unwrap_or(publish_defaults.topic_prefix),
            bar_topic_prefix: std::env::var("BRIDGE_BAR_TOPIC_PREFIX")
                .unwrap_or(publish_defaults.bar_topic_prefix),
        };

        let instruments = match std::env::var("BRIDGE_INSTRUMENTS") {
            Ok(raw) => parse_instruments(&raw)?,
            Err(_) => Vec::new(),
        };

        let metrics_port = parse_env_u16("BRIDGE_METRICS_PORT", 9090)?;

        let replay_file = std::env::var("BRIDGE_REPLAY_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            redis,
            pipeline,
            publish,
            instruments,
            metrics_port,
            replay_file,
        })
    }

    /// Assemble the pipeline construction parameters.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue_capacity: self.pipeline.queue_capacity,
            idle_backoff: self.pipeline.idle_backoff,
            drain_timeout: self.pipeline.drain_timeout,
            coalesce: self.pipeline.coalesce,
            burst_limit: self.pipeline.burst_limit,
            policy: self.publish.policy,
            topic_prefix: self.publish.topic_prefix.clone(),
            bar_topic_prefix: self.publish.bar_topic_prefix.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric environment variable failed to parse.
    #[error("environment variable {0} has invalid value {1:?}")]
    InvalidValue(&'static str, String),
    /// A `BRIDGE_INSTRUMENTS` entry is malformed.
    #[error("invalid instrument entry {0:?} (expected SYMBOL[:CONTRACT_ID[:EXCHANGE]])")]
    InvalidInstrument(String),
}

// =============================================================================
// Parse Helpers
// =============================================================================

fn parse_instruments(raw: &str) -> Result<Vec<InstrumentSeed>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(InstrumentSeed::parse)
        .collect()
}

fn parse_env_usize(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_env_u16(key: &'static str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(key: &'static str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_env_duration_micros(
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_micros)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_env_duration_millis(
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        Err(_) => Ok(default),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn pipeline_defaults() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.queue_capacity, 10_000);
        assert_eq!(settings.idle_backoff, Duration::from_micros(100));
        assert_eq!(settings.drain_timeout, Duration::from_secs(5));
        assert!(!settings.coalesce);
        assert_eq!(settings.burst_limit, 256);
    }

    #[test]
    fn publish_defaults() {
        let settings = PublishSettings::default();
        assert_eq!(settings.policy, PublishPolicy::QuoteAndTrade);
        assert_eq!(settings.topic_prefix, "ticks");
        assert_eq!(settings.bar_topic_prefix, "bars");
    }

    #[test]
    fn full_instrument_entry_parses() {
        let seed = InstrumentSeed::parse("AAPL:265598:NASDAQ").unwrap();
        assert_eq!(seed.symbol, "AAPL");
        assert_eq!(seed.contract_id, 265_598);
        assert_eq!(seed.exchange, "NASDAQ");
    }

    #[test]
    fn bare_symbol_gets_defaults() {
        let seed = InstrumentSeed::parse("TSLA").unwrap();
        assert_eq!(seed.symbol, "TSLA");
        assert_eq!(seed.contract_id, 0);
        assert_eq!(seed.exchange, "SMART");
    }

    #[test_case(""; "empty entry")]
    #[test_case("AAPL:abc"; "non numeric contract id")]
    #[test_case("AAPL:1:NASDAQ:extra"; "too many fields")]
    fn malformed_instrument_entry_is_rejected(entry: &str) {
        assert!(InstrumentSeed::parse(entry).is_err());
    }

    #[test]
    fn instrument_list_parses_with_whitespace() {
        let seeds = parse_instruments(" AAPL:265598:NASDAQ , SPY:756733:ARCA ,TSLA").unwrap();
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0].symbol, "AAPL");
        assert_eq!(seeds[1].exchange, "ARCA");
        assert_eq!(seeds[2].contract_id, 0);
    }

    #[test]
    fn empty_instrument_list_is_allowed() {
        assert!(parse_instruments("").unwrap().is_empty());
        assert!(parse_instruments(" , ").unwrap().is_empty());
    }
}
