//! Configuration
//!
//! Environment-driven configuration for the bridge.

mod settings;

pub use settings::{
    BridgeConfig, ConfigError, InstrumentSeed, PipelineSettings, PublishSettings, RedisSettings,
};
