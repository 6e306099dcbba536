//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tandem_animation::{
    Animation, AnimationBuffer, AnimationRef, AnimationScheduler, Capabilities, Pacing, StepError,
};
use tandem_core::SchedulerConfig;

/// Frame time handed to every publish in tests.
pub const FRAME: Duration = Duration::from_millis(16);

/// Upper bound for anything that waits on another thread.
pub const PATIENCE: Duration = Duration::from_secs(5);

pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        idle_interval_ms: 1,
        ..SchedulerConfig::default()
    }
}

/// Counts its steps and writes the CPU step count (as `u64`) at offset 0 of
/// its buffer, if it has one.
pub struct CountingAnimation {
    capabilities: Capabilities,
    pacing: Pacing,
    fail: AtomicBool,
    pub cpu_steps: AtomicU64,
    pub gpu_steps: AtomicU64,
}

impl CountingAnimation {
    pub fn new(capabilities: Capabilities) -> Arc<Self> {
        Self::with_pacing(capabilities, Pacing::Lockstep)
    }

    pub fn with_pacing(capabilities: Capabilities, pacing: Pacing) -> Arc<Self> {
        Arc::new(Self {
            capabilities,
            pacing,
            fail: AtomicBool::new(false),
            cpu_steps: AtomicU64::new(0),
            gpu_steps: AtomicU64::new(0),
        })
    }

    /// An animation whose CPU step always fails.
    pub fn failing() -> Arc<Self> {
        let animation = Self::new(Capabilities::CPU);
        animation.fail.store(true, Ordering::SeqCst);
        animation
    }

    pub fn cpu(&self) -> u64 {
        self.cpu_steps.load(Ordering::SeqCst)
    }

    pub fn gpu(&self) -> u64 {
        self.gpu_steps.load(Ordering::SeqCst)
    }
}

impl Animation for CountingAnimation {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn step_cpu(&self, _dt: Duration, buffer: Option<&AnimationBuffer>) -> Result<(), StepError> {
        let n = self.cpu_steps.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(StepError::msg("scripted failure"));
        }
        if let Some(buffer) = buffer {
            buffer.write_pod(0, &[n]);
        }
        Ok(())
    }

    fn step_gpu(&self, _dt: Duration) -> Result<(), StepError> {
        self.gpu_steps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Type-erases a concrete animation handle.
pub fn erased<A: Animation + 'static>(animation: &Arc<A>) -> AnimationRef {
    Arc::clone(animation) as AnimationRef
}

/// Publishes frames until `done` holds. Panics after [`PATIENCE`].
pub fn publish_until(scheduler: &AnimationScheduler, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + PATIENCE;
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        scheduler.publish(FRAME);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Waits without publishing until `done` holds. Panics after [`PATIENCE`].
pub fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + PATIENCE;
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}
