//! Dedicated threads for free-running animations.
//!
//! A free-running animation is not part of the lockstep cycle: its CPU step
//! runs on its own thread at a fixed rate. The thread sleeps the remainder of
//! each frame interval on a stop channel, so dropping the sender interrupts
//! it immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tandem_core::Clock;

use crate::error::{SchedulerError, SchedulerResult};
use crate::registry::LiveAnimation;
use crate::stats::StatsCounters;

/// Scheduler state a runner thread reads.
///
/// Must not reference the registration book, which owns the runners.
#[derive(Clone)]
pub(crate) struct RunnerContext {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) paused: Arc<AtomicBool>,
    pub(crate) stats: Arc<StatsCounters>,
    pub(crate) idle: Duration,
}

/// Handle to a running free-running animation thread.
pub(crate) struct FreeRunner {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Returns an error unless `frames_per_second` is finite and positive.
pub(crate) fn check_frame_rate(frames_per_second: f64) -> SchedulerResult<Duration> {
    if frames_per_second.is_finite() && frames_per_second > 0.0 {
        Ok(Duration::from_secs_f64(1.0 / frames_per_second))
    } else {
        Err(SchedulerError::InvalidFrameRate(frames_per_second))
    }
}

impl FreeRunner {
    pub(crate) fn spawn(
        entry: LiveAnimation,
        interval: Duration,
        context: RunnerContext,
        name: String,
    ) -> SchedulerResult<Self> {
        let (stop, stop_rx) = bounded(0);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || run(&entry, interval, &context, &stop_rx))
            .map_err(SchedulerError::Spawn)?;
        Ok(Self { stop, handle })
    }

    /// Stops the thread and waits for it, unless called from that thread.
    pub(crate) fn stop(self) {
        let Self { stop, handle } = self;
        drop(stop);
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!("free-running animation thread panicked");
        }
    }
}

fn run(entry: &LiveAnimation, interval: Duration, context: &RunnerContext, stop: &Receiver<()>) {
    tracing::debug!(animation = %entry.id, ?interval, "free-running thread started");
    let mut last = context.clock.now();

    loop {
        let started = Instant::now();

        if context.paused.load(Ordering::Acquire) {
            if !keep_running(stop, context.idle) {
                break;
            }
            last = context.clock.now();
            continue;
        }

        let now = context.clock.now();
        let dt = now.saturating_sub(last);
        last = now;

        if entry.animation.capabilities().cpu {
            StatsCounters::bump(&context.stats.free_running_steps, 1);
            if let Err(err) = entry.animation.step_cpu(dt, entry.buffer.as_deref()) {
                StatsCounters::bump(&context.stats.cpu_step_failures, 1);
                tracing::warn!(
                    animation = %entry.id,
                    name = entry.animation.name(),
                    error = %err,
                    "free-running CPU step failed"
                );
            }
        }

        if !keep_running(stop, interval.saturating_sub(started.elapsed())) {
            break;
        }
    }

    tracing::debug!(animation = %entry.id, "free-running thread stopped");
}

/// Sleeps up to `timeout`. Returns false once the stop sender is gone.
fn keep_running(stop: &Receiver<()>, timeout: Duration) -> bool {
    match stop.recv_timeout(timeout) {
        Err(RecvTimeoutError::Timeout) => true,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
    }
}
