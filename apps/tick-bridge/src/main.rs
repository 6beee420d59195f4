//! Tick Bridge Binary
//!
//! Starts the market data bridge: wires the pipeline, registers configured
//! instruments, connects the Redis sink, and runs until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-bridge
//! ```
//!
//! # Environment Variables
//!
//! - `BRIDGE_REDIS_URL`: Redis URL (default: `redis://127.0.0.1:6379/`)
//! - `BRIDGE_INSTRUMENTS`: `SYMBOL[:CONTRACT_ID[:EXCHANGE]]`, comma separated
//! - `BRIDGE_QUEUE_CAPACITY`: transfer queue slots (default: 10000)
//! - `BRIDGE_IDLE_BACKOFF_US`: consumer idle sleep in microseconds (default: 100)
//! - `BRIDGE_DRAIN_TIMEOUT_MS`: shutdown drain bound (default: 5000)
//! - `BRIDGE_COALESCE`: merge bursts, publish once per instrument (default: false)
//! - `BRIDGE_BURST_LIMIT`: events per coalesced burst (default: 256)
//! - `BRIDGE_PUBLISH_POLICY`: `quote_and_trade` | `quote_only`
//! - `BRIDGE_TOPIC_PREFIX`: snapshot topic prefix (default: `ticks`)
//! - `BRIDGE_BAR_TOPIC_PREFIX`: bar topic prefix (default: `bars`)
//! - `BRIDGE_METRICS_PORT`: Prometheus port, 0 disables (default: 9090)
//! - `BRIDGE_REPLAY_FILE`: CSV tick file to replay through the pipeline
//! - `RUST_LOG`: log filter (default: `tick_bridge=info`)

use std::sync::Arc;
use std::thread;

use anyhow::Context;
use tick_bridge::application::ports::ConnectionState;
use tick_bridge::application::ports::MarketDataHandler;
use tick_bridge::infrastructure::telemetry;
use tick_bridge::{
    BridgeConfig, InstrumentDirectory, InstrumentMeta, Pipeline, RedisSink, RedisSinkConfig,
    ReplayFeed, init_metrics,
};
use tokio::signal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    telemetry::init();

    tracing::info!("Starting Tick Bridge");

    let config = BridgeConfig::from_env().context("invalid configuration")?;
    init_metrics(config.metrics_port);
    log_config(&config);

    // Register configured instruments; the subscription path is the sole
    // writer of the directory.
    let directory = Arc::new(InstrumentDirectory::new());
    for (index, seed) in config.instruments.iter().enumerate() {
        let handle = u32::try_from(index + 1).unwrap_or(u32::MAX);
        directory.register(
            handle,
            InstrumentMeta::new(seed.symbol.clone(), seed.contract_id, seed.exchange.clone()),
        );
        tracing::info!(handle, instrument = %seed.symbol, exchange = %seed.exchange, "instrument registered");
    }
    if directory.is_empty() {
        tracing::warn!("no instruments configured; set BRIDGE_INSTRUMENTS to register some");
    }

    // Failure to reach the sink at startup is the only fatal sink error.
    let sink = RedisSink::connect(RedisSinkConfig::new(config.redis.url.clone()))
        .context("failed to connect Redis sink")?;
    tracing::info!(url = %config.redis.url, "Redis sink connected");

    let mut pipeline = Pipeline::start(
        config.pipeline_config(),
        Arc::clone(&directory),
        Box::new(sink),
    )
    .context("failed to start pipeline")?;

    // With a replay file the bridge feeds itself; otherwise a source
    // adapter linked in through the library API drives the handler.
    let replay_worker = match config.replay_file.as_ref() {
        Some(path) => {
            let feed = ReplayFeed::new(path.clone());
            let handler = pipeline.handler();
            let replay_directory = Arc::clone(&directory);
            let spawned = thread::Builder::new()
                .name("tick-bridge-replay".to_string())
                .spawn(move || {
                    handler.on_connection(ConnectionState::Connected);
                    match feed.run(&replay_directory, handler.as_ref()) {
                        Ok(stats) => tracing::info!(
                            dispatched = stats.dispatched(),
                            skipped = stats.skipped,
                            "replay finished"
                        ),
                        Err(e) => tracing::error!(error = %e, "replay failed"),
                    }
                    handler.on_connection(ConnectionState::Disconnected);
                });
            match spawned {
                Ok(worker) => Some(worker),
                Err(e) => {
                    tracing::error!(error = %e, "failed to spawn replay thread");
                    None
                }
            }
        }
        None => None,
    };

    tracing::info!("Tick bridge ready");

    await_shutdown().await;

    if let Some(worker) = replay_worker
        && worker.join().is_err()
    {
        tracing::error!("replay thread panicked");
    }

    pipeline.shutdown();

    let counters = pipeline.counters();
    tracing::info!(
        merged = counters.merged,
        snapshots_published = counters.snapshots_published,
        bars_published = counters.bars_published,
        dropped = counters.dropped,
        rejected = counters.rejected,
        unresolved = counters.unresolved,
        publish_failures = counters.publish_failures,
        "Tick bridge stopped"
    );
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &BridgeConfig) {
    tracing::info!(
        redis_url = %config.redis.url,
        queue_capacity = config.pipeline.queue_capacity,
        policy = config.publish.policy.as_str(),
        topic_prefix = %config.publish.topic_prefix,
        coalesce = config.pipeline.coalesce,
        metrics_port = config.metrics_port,
        instruments = config.instruments.len(),
        replay = config.replay_file.is_some(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
