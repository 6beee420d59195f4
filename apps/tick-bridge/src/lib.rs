#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Tick Bridge - Market Data Snapshot Publisher
//!
//! Bridges an upstream tick-by-tick market data source to a Redis pub/sub
//! bus. Partial facts (a quote, a trade) are merged into complete
//! per-instrument snapshots and republished as JSON, so downstream
//! consumers never need merge logic of their own.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Pure types and state machines
//!   - `event`: canonical update events
//!   - `snapshot`: per-instrument merge state machine
//!   - `directory`: subscription handle to instrument metadata
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: upstream callback surface, downstream sink contract
//!   - `services`: normalizer, aggregator, publisher, lifecycle controller
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `queue`: bounded lock-free transfer queue
//!   - `codec`: snapshot/bar JSON encoding
//!   - `redis`: Redis pub/sub sink adapter
//!   - `config`, `metrics`, `telemetry`, `replay`
//!
//! # Data Flow
//!
//! ```text
//! source callbacks ──► Normalizer ──► Transfer Queue ──► Aggregator ──► Publisher ──► Redis
//!  (producer thread)      │         (lock-free, bounded)   (consumer thread)
//!                         └── never blocks: full queue drops newest, counted
//! ```
//!
//! Control flows the other way: shutdown drains the queue under a timeout,
//! and a reconnect signal resets aggregation state without touching the
//! lifecycle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core market data types with no external I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::directory::{InstrumentDirectory, InstrumentMeta};
pub use domain::event::{
    BarUpdate, InstrumentHandle, InstrumentId, QuoteUpdate, TradeUpdate, UpdateEvent, UpdateKind,
    UpdatePayload,
};
pub use domain::snapshot::{InstrumentSnapshot, PublishPolicy};

// Ports
pub use application::ports::{ConnectionState, MarketDataHandler, SinkError, SnapshotSink};

// Pipeline services
pub use application::services::aggregator::{Aggregator, MergeOutcome};
pub use application::services::counters::{CounterSnapshot, PipelineCounters};
pub use application::services::normalizer::EventNormalizer;
pub use application::services::pipeline::{
    LifecycleState, Pipeline, PipelineConfig, PipelineError,
};
pub use application::services::publisher::{PublishError, Publisher};

// Infrastructure
pub use infrastructure::config::{
    BridgeConfig, ConfigError, InstrumentSeed, PipelineSettings, PublishSettings, RedisSettings,
};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::queue::TransferQueue;
pub use infrastructure::redis::{
    ReconnectConfig, ReconnectPolicy, RedisSink, RedisSinkConfig,
};
pub use infrastructure::replay::{ReplayError, ReplayFeed, ReplayStats};
pub use infrastructure::telemetry;
