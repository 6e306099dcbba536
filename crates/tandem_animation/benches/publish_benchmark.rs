//! # Publish Benchmark
//!
//! Measures the render-thread side of a frame:
//! 1. Publishing with nothing dirty (the common idle frame)
//! 2. Dirty-span uploads of a 4 MB buffer at several dirty fractions
//! 3. Many small buffers, all dirty
//!
//! The scheduler thread is never started, so only `publish` is timed.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tandem_animation::{
    Animation, AnimationRef, AnimationScheduler, BufferId, BufferTarget, Capabilities, HostBuffer,
};
use tandem_core::SchedulerConfig;

const FRAME: Duration = Duration::from_millis(16);
const LARGE: usize = 4 * 1024 * 1024;

struct Static;

impl Animation for Static {
    fn capabilities(&self) -> Capabilities {
        Capabilities::GPU
    }
}

fn scheduler_with_buffers(count: usize, size: usize) -> (AnimationScheduler, Vec<BufferId>) {
    let scheduler = AnimationScheduler::new(SchedulerConfig::default());
    let ids = (0..count)
        .map(|_| {
            let device = HostBuffer::new(size);
            let id = device.id();
            let animation: AnimationRef = Arc::new(Static);
            let _ = scheduler.register(animation, Some(BufferTarget::create(device)));
            id
        })
        .collect();
    (scheduler, ids)
}

fn bench_idle_publish(c: &mut Criterion) {
    let (scheduler, _) = scheduler_with_buffers(64, 256);
    c.bench_function("publish_idle_64_buffers", |b| {
        b.iter(|| black_box(scheduler.publish(black_box(FRAME))));
    });
}

fn bench_dirty_span(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_dirty_span");
    let (scheduler, ids) = scheduler_with_buffers(1, LARGE);
    let Some(buffer) = ids.first().and_then(|id| scheduler.buffer(*id)) else {
        return;
    };

    for dirty_pct in [1usize, 5, 25, 100] {
        let span = LARGE * dirty_pct / 100;
        let payload = vec![0x5Au8; span];
        group.throughput(Throughput::Bytes(span as u64));
        group.bench_with_input(BenchmarkId::new("percent", dirty_pct), &span, |b, _| {
            b.iter(|| {
                buffer.write(0, &payload);
                black_box(scheduler.publish(FRAME));
            });
        });
    }

    group.finish();
}

fn bench_many_buffers(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_many_buffers");

    for count in [16usize, 128, 1024] {
        let (scheduler, ids) = scheduler_with_buffers(count, 1024);
        let buffers: Vec<_> = ids.iter().filter_map(|id| scheduler.buffer(*id)).collect();
        group.bench_with_input(BenchmarkId::new("all_dirty", count), &count, |b, _| {
            b.iter(|| {
                for buffer in &buffers {
                    buffer.write(0, &[1; 64]);
                }
                black_box(scheduler.publish(FRAME));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_idle_publish, bench_dirty_span, bench_many_buffers);
criterion_main!(benches);
