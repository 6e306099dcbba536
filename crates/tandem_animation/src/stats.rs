//! Scheduler statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the scheduler, render and free-running threads.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) steps: AtomicU64,
    pub(crate) frames_consumed: AtomicU64,
    pub(crate) publishes: AtomicU64,
    pub(crate) cpu_step_failures: AtomicU64,
    pub(crate) gpu_step_failures: AtomicU64,
    pub(crate) buffer_uploads: AtomicU64,
    pub(crate) free_running_steps: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::AcqRel);
    }

    pub(crate) fn snapshot(&self) -> SchedulerStats {
        // frames before steps: a frame is only counted after its step, so
        // this order never reports more frames than steps.
        let frames_consumed = self.frames_consumed.load(Ordering::Acquire);
        let steps = self.steps.load(Ordering::Acquire);
        SchedulerStats {
            steps,
            frames_consumed,
            publishes: self.publishes.load(Ordering::Relaxed),
            cpu_step_failures: self.cpu_step_failures.load(Ordering::Relaxed),
            gpu_step_failures: self.gpu_step_failures.load(Ordering::Relaxed),
            buffer_uploads: self.buffer_uploads.load(Ordering::Relaxed),
            free_running_steps: self.free_running_steps.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Lockstep cycles completed by the scheduler thread.
    pub steps: u64,
    /// Publishes that consumed a ready step.
    pub frames_consumed: u64,
    /// All publish calls, including those with no ready step.
    pub publishes: u64,
    /// CPU steps that returned an error.
    pub cpu_step_failures: u64,
    /// GPU steps that returned an error.
    pub gpu_step_failures: u64,
    /// Device uploads performed by publish.
    pub buffer_uploads: u64,
    /// CPU steps run by free-running animation threads.
    pub free_running_steps: u64,
}

impl SchedulerStats {
    /// Steps computed but not yet consumed by the render thread. Always 0 or 1.
    #[must_use]
    pub fn look_ahead(&self) -> u64 {
        self.steps.saturating_sub(self.frames_consumed)
    }
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Whether a ready step was consumed (and "frame consumed" signalled).
    pub consumed_step: bool,
    /// Buffers that were dirty and got uploaded.
    pub buffers_uploaded: u32,
    /// GPU steps invoked.
    pub gpu_steps: u32,
    /// GPU steps that returned an error.
    pub gpu_step_failures: u32,
}
