//! Transfer Queue Benchmarks
//!
//! The enqueue path sits inside source callbacks and must stay in the
//! sub-microsecond range; these benches track push, pop, and the full
//! producer-to-consumer handoff.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{Criterion, criterion_group, criterion_main};

use tick_bridge::{TransferQueue, UpdateEvent};

const CHUNK: u64 = 10_000;

fn sample_event(i: u64) -> UpdateEvent {
    #[allow(clippy::cast_precision_loss)]
    let base = 100.0 + (i % 1_000) as f64 * 0.01;
    #[allow(clippy::cast_possible_wrap)]
    let timestamp_ms = i as i64;
    UpdateEvent::quote(1, timestamp_ms, base, base + 0.05, 100, 100)
}

fn bench_push(c: &mut Criterion) {
    c.bench_function("transfer_queue/try_push", |b| {
        b.iter_custom(|iters| {
            #[allow(clippy::cast_possible_truncation)]
            let queue = TransferQueue::new(CHUNK as usize);
            let mut total = Duration::ZERO;
            let mut remaining = iters;
            let mut i = 0u64;

            while remaining > 0 {
                let n = remaining.min(CHUNK);
                let start = Instant::now();
                for _ in 0..n {
                    queue.try_push(std::hint::black_box(sample_event(i)));
                    i += 1;
                }
                total += start.elapsed();
                while queue.try_pop().is_some() {}
                remaining -= n;
            }
            total
        });
    });
}

fn bench_pop(c: &mut Criterion) {
    c.bench_function("transfer_queue/try_pop", |b| {
        b.iter_custom(|iters| {
            #[allow(clippy::cast_possible_truncation)]
            let queue = TransferQueue::new(CHUNK as usize);
            let mut total = Duration::ZERO;
            let mut remaining = iters;

            while remaining > 0 {
                let n = remaining.min(CHUNK);
                for i in 0..n {
                    queue.try_push(sample_event(i));
                }
                let start = Instant::now();
                for _ in 0..n {
                    std::hint::black_box(queue.try_pop());
                }
                total += start.elapsed();
                remaining -= n;
            }
            total
        });
    });
}

fn bench_spsc_handoff(c: &mut Criterion) {
    c.bench_function("transfer_queue/spsc_handoff_100k", |b| {
        b.iter(|| {
            const COUNT: u64 = 100_000;
            let queue = Arc::new(TransferQueue::new(10_000));
            let producer_queue = Arc::clone(&queue);

            let producer = thread::spawn(move || {
                for i in 0..COUNT {
                    while !producer_queue.try_push(sample_event(i)) {
                        thread::yield_now();
                    }
                }
            });

            let mut received = 0u64;
            while received < COUNT {
                if queue.try_pop().is_some() {
                    received += 1;
                } else {
                    thread::yield_now();
                }
            }
            producer.join().expect("producer thread");
        });
    });
}

criterion_group!(benches, bench_push, bench_pop, bench_spsc_handoff);
criterion_main!(benches);
