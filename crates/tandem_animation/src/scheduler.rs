//! # Animation Scheduler
//!
//! Runs CPU steps on a background thread, one step ahead of the render
//! thread at most.
//!
//! ## Lockstep handshake
//!
//! ```text
//!   scheduler thread                         render thread
//!   ────────────────                         ─────────────
//!   drain registrations
//!   step_cpu(dt) × N
//!   raise(step_ready)  ───────────────┐
//!   wait(frame_consumed) ◄──┐         └───►  publish(dt):
//!        (blocked)          │                  take(step_ready)
//!                           │                  upload dirty buffers
//!                           │                  step_gpu(dt) × N
//!                           └─────────────     raise(frame_consumed)
//!   next cycle ...                           draw calls
//! ```
//!
//! `frame_consumed` is only raised by a publish that took a ready step, so
//! the number of computed steps never exceeds consumed frames by more than
//! one. If the render thread stops publishing the scheduler thread blocks in
//! the wait; [`AnimationScheduler::shutdown`] releases it.
//!
//! ## Registration
//!
//! `register`/`unregister` may be called from any thread. They only touch the
//! registration book; the scheduler thread applies the queued changes at the
//! top of each cycle (removals first, then additions), so a step in flight
//! always completes with the live set it started with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tandem_core::{Clock, MonotonicClock, SchedulerConfig, Signal};

use crate::animation::{AnimationId, AnimationRef, Pacing};
use crate::buffer::{AnimationBuffer, BufferId, BufferTarget};
use crate::error::{SchedulerError, SchedulerResult};
use crate::free_running::{check_frame_rate, FreeRunner, RunnerContext};
use crate::registry::{Booking, LiveAnimation, Registrations};
use crate::stats::{PublishReport, SchedulerStats, StatsCounters};

/// State shared between the scheduler handle and its thread.
struct Shared {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    registrations: Mutex<Registrations>,
    /// Live set as last drained, read by publish for GPU steps.
    roster: Mutex<Arc<[LiveAnimation]>>,
    /// Held by the scheduler thread for a whole round of CPU steps.
    step_gate: Mutex<()>,
    step_ready: Signal,
    frame_consumed: Signal,
    /// Cuts the idle wait short on registration, resume and shutdown.
    wake: Signal,
    paused: Arc<AtomicBool>,
    shutdown: AtomicBool,
    clock_reset: AtomicBool,
    stats: Arc<StatsCounters>,
}

/// Schedules animation steps across the scheduler and render threads.
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tandem_animation::{Animation, AnimationScheduler, Capabilities};
/// use tandem_core::SchedulerConfig;
///
/// struct Spin;
///
/// impl Animation for Spin {
///     fn capabilities(&self) -> Capabilities {
///         Capabilities::CPU
///     }
/// }
///
/// let scheduler = AnimationScheduler::new(SchedulerConfig::default());
/// scheduler.start().unwrap();
/// scheduler.register(Arc::new(Spin), None).unwrap();
///
/// // Once per rendered frame, on the render thread:
/// let report = scheduler.publish(Duration::from_millis(16));
/// assert_eq!(report.buffers_uploaded, 0);
///
/// scheduler.shutdown().unwrap();
/// ```
pub struct AnimationScheduler {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    render_thread: Mutex<Option<ThreadId>>,
}

impl AnimationScheduler {
    /// Creates a stopped scheduler using wall-clock time.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Creates a stopped scheduler with a custom clock.
    #[must_use]
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let paused = Arc::new(AtomicBool::new(config.start_paused));
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                registrations: Mutex::new(Registrations::default()),
                roster: Mutex::new(Arc::from(Vec::new())),
                step_gate: Mutex::new(()),
                step_ready: Signal::new(),
                frame_consumed: Signal::new(),
                wake: Signal::new(),
                paused,
                shutdown: AtomicBool::new(false),
                clock_reset: AtomicBool::new(false),
                stats: Arc::new(StatsCounters::default()),
            }),
            thread: Mutex::new(None),
            render_thread: Mutex::new(None),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Spawns the scheduler thread. Does nothing if it is already running.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] if the OS refuses the thread.
    pub fn start(&self) -> SchedulerResult<()> {
        let mut slot = self.thread.lock();
        if let Some(handle) = slot.take() {
            if !handle.is_finished() {
                *slot = Some(handle);
                return Ok(());
            }
            if handle.join().is_err() {
                tracing::error!("previous scheduler thread panicked");
            }
        }

        let shared = &self.shared;
        shared.shutdown.store(false, Ordering::Release);
        shared.clock_reset.store(true, Ordering::Release);
        shared.step_ready.clear();
        shared.frame_consumed.clear();
        shared.wake.clear();

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || run(&shared))
            .map_err(SchedulerError::Spawn)?;
        *slot = Some(handle);
        Ok(())
    }

    /// Returns true while the scheduler thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Registers `animation`, optionally writing into the GPU buffer `target`.
    ///
    /// The animation becomes live at the scheduler's next drain. A
    /// [`Pacing::FreeRunning`] animation gets its own thread immediately.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::AlreadyRegistered`] if this `Arc` is registered.
    /// - [`SchedulerError::UnknownBuffer`] if `target` names an unregistered buffer.
    /// - [`SchedulerError::InvalidFrameRate`] for a non-positive free-running rate.
    /// - [`SchedulerError::Spawn`] if the free-running thread cannot start.
    pub fn register(
        &self,
        animation: AnimationRef,
        target: Option<BufferTarget>,
    ) -> SchedulerResult<AnimationId> {
        let interval = match animation.pacing() {
            Pacing::Lockstep => None,
            Pacing::FreeRunning { frames_per_second } => Some(check_frame_rate(frames_per_second)?),
        };

        let mut registrations = self.shared.registrations.lock();
        let entry = registrations.book(animation, target)?;
        if let Some(interval) = interval {
            let name = format!("{}-{}", self.shared.config.thread_name, entry.id);
            match FreeRunner::spawn(entry.clone(), interval, self.runner_context(), name) {
                Ok(runner) => registrations.attach_runner(entry.key, runner),
                Err(err) => {
                    registrations.unbook_key(entry.key);
                    return Err(err);
                }
            }
        }
        drop(registrations);

        tracing::debug!(
            animation = %entry.id,
            name = entry.animation.name(),
            buffer = ?entry.buffer.as_ref().map(|b| b.id()),
            "animation registered"
        );
        self.shared.wake.raise();
        Ok(entry.id)
    }

    /// Unregisters `animation`.
    ///
    /// Takes effect at the scheduler's next drain; a step already in flight
    /// completes. If the animation was never drained it never steps. The
    /// animation's buffer is released once no registered animation uses it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRegistered`] if `animation` is not registered.
    pub fn unregister(&self, animation: &AnimationRef) -> SchedulerResult<()> {
        let booking = self.shared.registrations.lock().unbook(animation)?;
        tracing::debug!(animation = %booking.id, "animation unregistered");
        retire(vec![booking]);
        self.shared.wake.raise();
        Ok(())
    }

    /// Unregisters every animation.
    pub fn clear(&self) {
        let bookings = self.shared.registrations.lock().unbook_all();
        if !bookings.is_empty() {
            tracing::debug!(count = bookings.len(), "all animations unregistered");
        }
        retire(bookings);
        self.shared.wake.raise();
    }

    /// Publishes the last completed step to the GPU and releases the next one.
    ///
    /// Call once per rendered frame, on the thread that owns the graphics
    /// context, before draw calls that read animated buffers:
    ///
    /// 1. take the "step ready" flag without blocking,
    /// 2. upload every dirty buffer, unless a round of CPU steps is still
    ///    writing (then the uploads wait for a later publish),
    /// 3. run GPU steps (skipped while paused),
    /// 4. signal "frame consumed" if a ready step was taken.
    ///
    /// Never blocks on the scheduler thread.
    pub fn publish(&self, dt: Duration) -> PublishReport {
        self.check_render_thread();
        let shared = &*self.shared;
        let stats = &*shared.stats;
        StatsCounters::bump(&stats.publishes, 1);

        let consumed_step = shared.step_ready.take();
        let mut report = PublishReport {
            consumed_step,
            ..PublishReport::default()
        };

        // A taken step means the scheduler thread is parked until we raise
        // frame_consumed, so the gate is free.
        let gate = if consumed_step {
            Some(shared.step_gate.lock())
        } else {
            shared.step_gate.try_lock()
        };
        if gate.is_some() {
            let buffers = shared.registrations.lock().buffer_snapshot();
            for buffer in &buffers {
                if buffer.publish() {
                    report.buffers_uploaded += 1;
                }
            }
            StatsCounters::bump(&stats.buffer_uploads, u64::from(report.buffers_uploaded));
        } else {
            tracing::trace!("CPU steps in flight, uploads deferred");
        }
        drop(gate);

        if !self.is_paused() {
            let roster = Arc::clone(&*shared.roster.lock());
            for entry in roster.iter() {
                if !entry.animation.capabilities().gpu {
                    continue;
                }
                report.gpu_steps += 1;
                if let Err(err) = entry.animation.step_gpu(dt) {
                    report.gpu_step_failures += 1;
                    tracing::warn!(
                        animation = %entry.id,
                        name = entry.animation.name(),
                        error = %err,
                        "GPU step failed"
                    );
                }
            }
            StatsCounters::bump(&stats.gpu_step_failures, u64::from(report.gpu_step_failures));
        }

        if consumed_step {
            StatsCounters::bump(&stats.frames_consumed, 1);
            shared.frame_consumed.raise();
        }
        report
    }

    /// Stops CPU steps and GPU steps. Buffers still publish.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    /// Resumes stepping.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
        self.shared.wake.raise();
    }

    /// Returns true while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Restarts elapsed-time accounting: the next CPU step receives a zero `dt`.
    pub fn reset_clock(&self) {
        self.shared.clock_reset.store(true, Ordering::Release);
    }

    /// Stops the scheduler thread and ends the session.
    ///
    /// Wakes the thread out of any wait, joins it, then releases every
    /// registration, buffer and free-running thread. Safe to call when the
    /// scheduler was never started, and more than once.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::ShutdownFromSchedulerThread`] when called from a
    ///   CPU step, where joining would deadlock.
    /// - [`SchedulerError::ThreadPanicked`] if the scheduler thread panicked.
    ///   The session is still ended.
    pub fn shutdown(&self) -> SchedulerResult<()> {
        let handle = {
            let mut slot = self.thread.lock();
            if slot
                .as_ref()
                .is_some_and(|handle| handle.thread().id() == thread::current().id())
            {
                return Err(SchedulerError::ShutdownFromSchedulerThread);
            }
            slot.take()
        };

        let shared = &*self.shared;
        shared.shutdown.store(true, Ordering::Release);
        shared.frame_consumed.raise();
        shared.wake.raise();

        let joined = match handle {
            Some(handle) => handle.join().map_err(|_| SchedulerError::ThreadPanicked),
            None => Ok(()),
        };

        let bookings = shared.registrations.lock().reset();
        retire(bookings);
        *shared.roster.lock() = Arc::from(Vec::new());
        shared.step_ready.clear();
        shared.frame_consumed.clear();
        shared.wake.clear();
        *self.render_thread.lock() = None;

        joined
    }

    /// Number of animations in the live set as of the last drain.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.shared.roster.lock().len()
    }

    /// Number of registered animations, drained or not.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.shared.registrations.lock().registered_count()
    }

    /// Returns the staging buffer registered under `id`.
    #[must_use]
    pub fn buffer(&self, id: BufferId) -> Option<Arc<AnimationBuffer>> {
        self.shared.registrations.lock().buffer(id)
    }

    /// Number of registered animations writing into buffer `id`.
    #[must_use]
    pub fn buffer_ref_count(&self, id: BufferId) -> usize {
        self.shared.registrations.lock().buffer_ref_count(id)
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.shared.stats.snapshot()
    }

    fn runner_context(&self) -> RunnerContext {
        RunnerContext {
            clock: Arc::clone(&self.shared.clock),
            paused: Arc::clone(&self.shared.paused),
            stats: Arc::clone(&self.shared.stats),
            idle: self.shared.config.idle_interval(),
        }
    }

    fn check_render_thread(&self) {
        if cfg!(debug_assertions) {
            let current = thread::current().id();
            let owner = *self.render_thread.lock().get_or_insert(current);
            debug_assert_eq!(
                owner, current,
                "publish must always be called from the same thread"
            );
        }
    }
}

impl Drop for AnimationScheduler {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(error = %err, "animation scheduler shutdown failed");
        }
    }
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationScheduler")
            .field("running", &self.is_running())
            .field("paused", &self.is_paused())
            .field("live", &self.live_count())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Stops the free-running threads of released bookings.
fn retire(bookings: Vec<Booking>) {
    for runner in bookings.into_iter().filter_map(|booking| booking.runner) {
        runner.stop();
    }
}

fn run(shared: &Shared) {
    tracing::info!(thread = %shared.config.thread_name, "animation scheduler started");
    let mut live: Vec<LiveAnimation> = Vec::new();
    let mut last = shared.clock.now();

    loop {
        let now = shared.clock.now();
        if shared.clock_reset.swap(false, Ordering::AcqRel) {
            last = now;
        }
        let dt = now.saturating_sub(last);
        last = now;

        if shared.shutdown.load(Ordering::Acquire) {
            shared.registrations.lock().drain_removals(&mut live);
            break;
        }

        {
            let mut registrations = shared.registrations.lock();
            let outcome = registrations.drain(&mut live);
            if outcome.changed() {
                *shared.roster.lock() = Arc::from(live.clone());
                tracing::debug!(
                    added = outcome.added,
                    removed = outcome.removed,
                    live = live.len(),
                    "live set changed"
                );
            }
        }

        if shared.paused.load(Ordering::Acquire) || live.is_empty() {
            shared.wake.wait_timeout(shared.config.idle_interval());
            continue;
        }

        let gate = shared.step_gate.lock();
        for entry in &live {
            if !entry.pacing.is_lockstep() || !entry.animation.capabilities().cpu {
                continue;
            }
            if let Err(err) = entry.animation.step_cpu(dt, entry.buffer.as_deref()) {
                StatsCounters::bump(&shared.stats.cpu_step_failures, 1);
                tracing::warn!(
                    animation = %entry.id,
                    name = entry.animation.name(),
                    error = %err,
                    "CPU step failed"
                );
            }
        }
        drop(gate);

        StatsCounters::bump(&shared.stats.steps, 1);
        shared.step_ready.raise();
        shared.frame_consumed.wait();
    }

    tracing::info!(thread = %shared.config.thread_name, "animation scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Animation, Capabilities};
    use crate::device::HostBuffer;
    use std::sync::atomic::AtomicU64;
    use std::time::Instant;
    use tandem_core::ManualClock;

    #[derive(Default)]
    struct Counter {
        cpu: AtomicU64,
        gpu: AtomicU64,
    }

    impl Animation for Counter {
        fn capabilities(&self) -> Capabilities {
            Capabilities::BOTH
        }

        fn step_cpu(
            &self,
            _dt: Duration,
            buffer: Option<&AnimationBuffer>,
        ) -> Result<(), crate::StepError> {
            let n = self.cpu.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(buffer) = buffer {
                buffer.write_pod(0, &[n]);
            }
            Ok(())
        }

        fn step_gpu(&self, _dt: Duration) -> Result<(), crate::StepError> {
            self.gpu.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            idle_interval_ms: 1,
            ..SchedulerConfig::default()
        }
    }

    /// Publishes until `done` holds or two seconds pass.
    fn publish_until(scheduler: &AnimationScheduler, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            scheduler.publish(Duration::from_millis(16));
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let scheduler = AnimationScheduler::new(fast_config());
        assert!(!scheduler.is_running());
        scheduler.start().unwrap();
        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        scheduler.shutdown().unwrap();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_steps_and_publishes() {
        let scheduler = AnimationScheduler::new(fast_config());
        scheduler.start().unwrap();

        let counter = Arc::new(Counter::default());
        let animation: AnimationRef = counter.clone();
        scheduler.register(animation, None).unwrap();

        publish_until(&scheduler, || counter.gpu.load(Ordering::SeqCst) >= 5);
        assert!(counter.cpu.load(Ordering::SeqCst) >= 1);
        assert_eq!(scheduler.live_count(), 1);

        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_buffer_written_by_step_reaches_device() {
        let scheduler = AnimationScheduler::new(fast_config());
        scheduler.start().unwrap();

        let device = HostBuffer::new(8);
        let probe = device.probe();
        let counter = Arc::new(Counter::default());
        let animation: AnimationRef = counter.clone();
        scheduler
            .register(animation, Some(BufferTarget::create(device)))
            .unwrap();

        publish_until(&scheduler, || probe.upload_count() >= 1);
        let value: Vec<u64> = bytemuck::pod_collect_to_vec(&probe.contents());
        assert!(value[0] >= 1);

        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_ends_session() {
        let scheduler = AnimationScheduler::new(fast_config());
        scheduler.start().unwrap();

        let device = HostBuffer::new(8);
        let id = device.id();
        let animation: AnimationRef = Arc::new(Counter::default());
        scheduler
            .register(Arc::clone(&animation), Some(BufferTarget::create(device)))
            .unwrap();

        scheduler.shutdown().unwrap();
        assert_eq!(scheduler.registered_count(), 0);
        assert_eq!(scheduler.live_count(), 0);
        assert!(scheduler.buffer(id).is_none());

        // A new session accepts the same animation again.
        scheduler.start().unwrap();
        scheduler.register(animation, None).unwrap();
        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_without_start() {
        let scheduler = AnimationScheduler::new(SchedulerConfig::default());
        scheduler.shutdown().unwrap();
        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_start_paused_config() {
        let scheduler = AnimationScheduler::new(SchedulerConfig {
            start_paused: true,
            ..fast_config()
        });
        assert!(scheduler.is_paused());
        scheduler.resume();
        assert!(!scheduler.is_paused());
    }

    #[test]
    fn test_reset_clock_gives_zero_dt() {
        struct LastDt(Mutex<Vec<Duration>>);

        impl Animation for LastDt {
            fn capabilities(&self) -> Capabilities {
                Capabilities::CPU
            }

            fn step_cpu(
                &self,
                dt: Duration,
                _buffer: Option<&AnimationBuffer>,
            ) -> Result<(), crate::StepError> {
                self.0.lock().push(dt);
                Ok(())
            }
        }

        let clock = Arc::new(ManualClock::new());
        let scheduler = AnimationScheduler::with_clock(fast_config(), clock.clone());
        let recorder = Arc::new(LastDt(Mutex::new(Vec::new())));
        let animation: AnimationRef = recorder.clone();
        scheduler.register(animation, None).unwrap();

        clock.advance(Duration::from_secs(5));
        scheduler.start().unwrap();
        publish_until(&scheduler, || !recorder.0.lock().is_empty());

        // The first step after start never sees time that passed while stopped.
        assert_eq!(recorder.0.lock()[0], Duration::ZERO);
        scheduler.shutdown().unwrap();
    }
}
