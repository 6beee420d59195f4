//! Pipeline Lifecycle Controller
//!
//! Wires the directory, transfer queue, normalizer, aggregator, and
//! publisher together and owns the consumer thread.
//!
//! # Lifecycle
//!
//! `Starting -> Running -> Draining -> Stopped`. Construction is the only
//! fatal path; once running, every error is counted and survived. On
//! shutdown the consumer keeps draining the queue until it is empty or the
//! drain timeout elapses.
//!
//! # Reconnect
//!
//! [`Pipeline::signal_reconnect`] is the hook a source adapter calls after
//! its session is re-established. It is orthogonal to the lifecycle: the
//! consumer observes the flag at the top of its loop and resets every
//! snapshot in place, because the upstream may now replay fresh data
//! against stale local state. Re-subscription itself stays with the
//! adapter (the directory keeps its handles).

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::application::ports::SnapshotSink;
use crate::application::services::aggregator::{Aggregator, MergeOutcome};
use crate::application::services::counters::{CounterSnapshot, PipelineCounters};
use crate::application::services::normalizer::EventNormalizer;
use crate::application::services::publisher::Publisher;
use crate::domain::directory::InstrumentDirectory;
use crate::domain::event::{BarUpdate, InstrumentId, UpdateEvent};
use crate::domain::snapshot::{InstrumentSnapshot, PublishPolicy};
use crate::infrastructure::metrics;
use crate::infrastructure::queue::TransferQueue;

// =============================================================================
// Lifecycle State
// =============================================================================

/// Pipeline lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Components are being wired; no events flow.
    Starting = 0,
    /// Producer and consumer are live.
    Running = 1,
    /// Shutdown signalled; the consumer is emptying the queue.
    Draining = 2,
    /// Terminal.
    Stopped = 3,
}

impl LifecycleState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Atomic cell holding the lifecycle state.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    const fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn set(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }
}

// =============================================================================
// Error Type
// =============================================================================

/// Error constructing the pipeline. Startup is the only fatal path.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The transfer queue cannot have zero slots.
    #[error("transfer queue capacity must be non-zero")]
    ZeroQueueCapacity,

    /// Coalescing needs a non-zero burst limit.
    #[error("coalesce burst limit must be non-zero")]
    ZeroBurstLimit,

    /// The consumer thread could not be spawned.
    #[error("failed to spawn consumer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// =============================================================================
// Configuration
// =============================================================================

/// Pipeline construction parameters.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Transfer queue capacity (slots, fixed for the process lifetime).
    pub queue_capacity: usize,
    /// Consumer sleep when the queue is empty.
    pub idle_backoff: Duration,
    /// Bound on draining the queue at shutdown.
    pub drain_timeout: Duration,
    /// Merge bursts and publish each instrument once per cycle.
    pub coalesce: bool,
    /// Maximum events merged per coalesced burst.
    pub burst_limit: usize,
    /// When a snapshot becomes eligible for publishing.
    pub policy: PublishPolicy,
    /// Topic prefix for snapshots.
    pub topic_prefix: String,
    /// Topic prefix for bars.
    pub bar_topic_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            idle_backoff: Duration::from_micros(100),
            drain_timeout: Duration::from_secs(5),
            coalesce: false,
            burst_limit: 256,
            policy: PublishPolicy::QuoteAndTrade,
            topic_prefix: "ticks".to_string(),
            bar_topic_prefix: "bars".to_string(),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// The assembled ingestion-to-publish pipeline.
#[derive(Debug)]
pub struct Pipeline {
    directory: Arc<InstrumentDirectory>,
    queue: Arc<TransferQueue<UpdateEvent>>,
    normalizer: Arc<EventNormalizer>,
    counters: Arc<PipelineCounters>,
    shutdown: Arc<AtomicBool>,
    reconnect: Arc<AtomicBool>,
    state: Arc<StateCell>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Wire the components and spawn the consumer thread.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] on invalid parameters or a failed thread
    /// spawn. This is the only place the bridge is allowed to fail fast.
    pub fn start(
        config: PipelineConfig,
        directory: Arc<InstrumentDirectory>,
        sink: Box<dyn SnapshotSink + Send>,
    ) -> Result<Self, PipelineError> {
        if config.queue_capacity == 0 {
            return Err(PipelineError::ZeroQueueCapacity);
        }
        if config.coalesce && config.burst_limit == 0 {
            return Err(PipelineError::ZeroBurstLimit);
        }

        let state = Arc::new(StateCell::new(LifecycleState::Starting));
        let queue = Arc::new(TransferQueue::new(config.queue_capacity));
        let counters = Arc::new(PipelineCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let reconnect = Arc::new(AtomicBool::new(false));

        let normalizer = Arc::new(EventNormalizer::new(
            Arc::clone(&directory),
            Arc::clone(&queue),
            Arc::clone(&counters),
        ));

        let ctx = ConsumerContext {
            queue: Arc::clone(&queue),
            aggregator: Aggregator::new(
                Arc::clone(&directory),
                config.policy,
                Arc::clone(&counters),
            ),
            publisher: Publisher::new(sink, config.topic_prefix, config.bar_topic_prefix),
            counters: Arc::clone(&counters),
            shutdown: Arc::clone(&shutdown),
            reconnect: Arc::clone(&reconnect),
            state: Arc::clone(&state),
            idle_backoff: config.idle_backoff,
            drain_timeout: config.drain_timeout,
            coalesce: config.coalesce,
            burst_limit: config.burst_limit,
        };

        let worker = thread::Builder::new()
            .name("tick-bridge-consumer".to_string())
            .spawn(move || run_consumer(ctx))?;

        state.set(LifecycleState::Running);
        tracing::info!(
            queue_capacity = config.queue_capacity,
            policy = config.policy.as_str(),
            coalesce = config.coalesce,
            "pipeline running"
        );

        Ok(Self {
            directory,
            queue,
            normalizer,
            counters,
            shutdown,
            reconnect,
            state,
            worker: Some(worker),
        })
    }

    /// The callback handler a source adapter drives.
    #[must_use]
    pub fn handler(&self) -> Arc<EventNormalizer> {
        Arc::clone(&self.normalizer)
    }

    /// The shared instrument directory.
    #[must_use]
    pub fn directory(&self) -> Arc<InstrumentDirectory> {
        Arc::clone(&self.directory)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Current transfer queue depth.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Instruct the consumer to reset all aggregation state.
    ///
    /// Called by the source adapter after its session is re-established.
    /// Does not change the lifecycle state.
    pub fn signal_reconnect(&self) {
        self.reconnect.store(true, Ordering::Release);
        tracing::info!("reconnect signalled; aggregation state will reset");
    }

    /// Point-in-time view of all pipeline tallies.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        CounterSnapshot {
            dropped: self.queue.dropped(),
            rejected: self.counters.rejected(),
            unresolved: self.counters.unresolved(),
            merged: self.counters.merged(),
            snapshots_published: self.counters.snapshots_published(),
            bars_published: self.counters.bars_published(),
            publish_failures: self.counters.publish_failures(),
        }
    }

    /// Signal shutdown and wait for the consumer to drain and exit.
    ///
    /// Idempotent; the second and later calls are no-ops.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shutdown.store(true, Ordering::Release);
        if worker.join().is_err() {
            tracing::error!("consumer thread panicked during shutdown");
        }
        self.state.set(LifecycleState::Stopped);
        tracing::info!("pipeline stopped");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Consumer Loop
// =============================================================================

struct ConsumerContext {
    queue: Arc<TransferQueue<UpdateEvent>>,
    aggregator: Aggregator,
    publisher: Publisher,
    counters: Arc<PipelineCounters>,
    shutdown: Arc<AtomicBool>,
    reconnect: Arc<AtomicBool>,
    state: Arc<StateCell>,
    idle_backoff: Duration,
    drain_timeout: Duration,
    coalesce: bool,
    burst_limit: usize,
}

fn run_consumer(mut ctx: ConsumerContext) {
    tracing::info!("consumer loop started");
    let mut drain_deadline: Option<Instant> = None;

    loop {
        if ctx.reconnect.swap(false, Ordering::AcqRel) {
            tracing::info!(
                instruments = ctx.aggregator.len(),
                "resetting aggregation state after upstream reconnect"
            );
            ctx.aggregator.reset_all();
        }

        if drain_deadline.is_none() && ctx.shutdown.load(Ordering::Acquire) {
            ctx.state.set(LifecycleState::Draining);
            drain_deadline = Some(Instant::now() + ctx.drain_timeout);
            tracing::info!(queued = ctx.queue.len(), "draining transfer queue");
        }

        if let Some(deadline) = drain_deadline
            && Instant::now() >= deadline
        {
            tracing::warn!(
                remaining = ctx.queue.len(),
                "drain timeout elapsed with events still queued"
            );
            break;
        }

        let worked = if ctx.coalesce {
            drain_burst(&mut ctx)
        } else {
            drain_one(&mut ctx)
        };

        #[allow(clippy::cast_precision_loss)]
        metrics::set_queue_depth(ctx.queue.len() as f64);
        metrics::sync_producer_counters(
            ctx.queue.dropped(),
            ctx.counters.rejected(),
            ctx.counters.unresolved(),
        );

        if !worked {
            if drain_deadline.is_some() {
                // Queue fully drained during shutdown.
                break;
            }
            thread::sleep(ctx.idle_backoff);
        }
    }

    tracing::info!("consumer loop stopped");
}

/// Pop and process a single event. Returns `false` when the queue is empty.
fn drain_one(ctx: &mut ConsumerContext) -> bool {
    let Some(event) = ctx.queue.try_pop() else {
        return false;
    };

    match ctx.aggregator.apply(&event) {
        MergeOutcome::Ready(snapshot) => {
            deliver_snapshot(&mut ctx.publisher, &ctx.counters, snapshot);
        }
        MergeOutcome::Bar {
            instrument,
            timestamp_ms,
            bar,
        } => {
            deliver_bar(&mut ctx.publisher, &ctx.counters, &instrument, timestamp_ms, &bar);
        }
        MergeOutcome::Pending | MergeOutcome::Discarded => {}
    }
    true
}

/// Merge a bounded burst, then publish each dirty instrument once with its
/// latest state. Bars still publish immediately. Returns `false` when the
/// queue was empty.
fn drain_burst(ctx: &mut ConsumerContext) -> bool {
    let mut dirty: HashSet<InstrumentId> = HashSet::new();
    let mut popped = 0usize;

    while popped < ctx.burst_limit {
        let Some(event) = ctx.queue.try_pop() else {
            break;
        };
        popped += 1;

        match ctx.aggregator.apply(&event) {
            MergeOutcome::Ready(snapshot) => {
                dirty.insert(snapshot.instrument.clone());
            }
            MergeOutcome::Bar {
                instrument,
                timestamp_ms,
                bar,
            } => {
                deliver_bar(&mut ctx.publisher, &ctx.counters, &instrument, timestamp_ms, &bar);
            }
            MergeOutcome::Pending | MergeOutcome::Discarded => {}
        }
    }

    for instrument in &dirty {
        if let Some(snapshot) = ctx.aggregator.get(instrument) {
            deliver_snapshot(&mut ctx.publisher, &ctx.counters, snapshot);
        }
    }

    popped > 0
}

fn deliver_snapshot(
    publisher: &mut Publisher,
    counters: &PipelineCounters,
    snapshot: &InstrumentSnapshot,
) {
    match publisher.publish_snapshot(snapshot) {
        Ok(()) => {
            counters.record_snapshot_published();
            metrics::record_snapshot_published();
        }
        Err(e) => {
            counters.record_publish_failure();
            metrics::record_publish_failure();
            tracing::warn!(instrument = %snapshot.instrument, error = %e, "snapshot publish failed");
        }
    }
}

fn deliver_bar(
    publisher: &mut Publisher,
    counters: &PipelineCounters,
    instrument: &str,
    timestamp_ms: i64,
    bar: &BarUpdate,
) {
    match publisher.publish_bar(instrument, timestamp_ms, bar) {
        Ok(()) => {
            counters.record_bar_published();
            metrics::record_bar_published();
        }
        Err(e) => {
            counters.record_publish_failure();
            metrics::record_publish_failure();
            tracing::warn!(instrument = %instrument, error = %e, "bar publish failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
