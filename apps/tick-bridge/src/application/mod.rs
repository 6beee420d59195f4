//! Application layer - Use cases and port definitions.

/// Interfaces for the upstream source and downstream sink.
pub mod ports;

/// Pipeline services: normalizer, aggregator, publisher, lifecycle.
pub mod services;
