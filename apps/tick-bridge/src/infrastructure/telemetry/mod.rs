//! Tracing Initialization
//!
//! Configures the `tracing` subscriber with an environment filter and a
//! compact fmt layer.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: `tick_bridge=info`)

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "tick_bridge=info";

/// Initialize the tracing subscriber from the environment.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Initialize the tracing subscriber with a fallback filter.
///
/// `RUST_LOG` takes precedence when set. Subsequent calls are no-ops, so
/// tests may call this freely.
pub fn init_with_filter(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

// =============================================================================
// Tests
// =============================================================================
