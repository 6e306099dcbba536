//! Frame Loop - render thread driver
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         FRAME TIMELINE                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  0ms    ├── Begin Frame                                         │
//! │         │   └── Measure dt since the previous frame             │
//! │                                                                 │
//! │  ~0ms   ├── AnimationScheduler::publish(dt)                     │
//! │         │   ├── Upload dirty animation buffers                  │
//! │         │   ├── GPU steps                                       │
//! │         │   └── Release the scheduler's next CPU step           │
//! │                                                                 │
//! │  1ms    ├── Draw callback                                       │
//! │         │   └── Draw calls read the freshly uploaded buffers    │
//! │                                                                 │
//! │  16ms   └── Frame Complete                                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While the draw callback runs, the scheduler thread is already computing
//! the next step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tandem_animation::{AnimationScheduler, PublishReport};

/// Configuration for the frame loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLoopConfig {
    /// Target frame rate
    pub target_fps: u32,
    /// Maximum frame time before a frame counts as over budget (microseconds)
    pub frame_budget_us: u32,
}

impl RenderLoopConfig {
    /// Time between frames at the target rate.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            frame_budget_us: 16_666, // ~16ms for 60fps
        }
    }
}

/// What the draw callback gets to see
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Frame number, starting at 1
    pub frame_number: u64,
    /// Time since the previous frame
    pub delta: Duration,
    /// What publish did for this frame
    pub publish: PublishReport,
}

/// Result of a single frame
#[derive(Debug, Clone, Copy)]
pub struct FrameResult {
    /// Frame number
    pub frame_number: u64,
    /// Total frame time (microseconds)
    pub frame_time_us: u32,
    /// Time spent in publish (microseconds)
    pub publish_us: u32,
    /// Time spent in the draw callback (microseconds)
    pub draw_us: u32,
    /// What publish did
    pub publish: PublishReport,
    /// Over budget warning
    pub over_budget: bool,
}

/// Statistics for the frame loop
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameLoopStats {
    /// Total frames rendered
    pub total_frames: u64,
    /// Average frame time (microseconds)
    pub avg_frame_time_us: u32,
    /// Worst frame time (microseconds)
    pub worst_frame_time_us: u32,
    /// Frames over budget
    pub frames_over_budget: u32,
    /// Frames that consumed a completed animation step
    pub steps_consumed: u64,
    /// Buffer uploads across all frames
    pub buffers_uploaded: u64,
}

/// Drives one render thread.
///
/// Must be used from the thread that owns the graphics context.
pub struct FrameLoop {
    config: RenderLoopConfig,
    scheduler: Arc<AnimationScheduler>,
    last_frame: Option<Instant>,
    frame_count: u64,
    total_frame_time_us: u64,
    stats: FrameLoopStats,
}

impl FrameLoop {
    /// Creates a frame loop publishing to `scheduler`.
    #[must_use]
    pub fn new(config: RenderLoopConfig, scheduler: Arc<AnimationScheduler>) -> Self {
        Self {
            config,
            scheduler,
            last_frame: None,
            frame_count: 0,
            total_frame_time_us: 0,
            stats: FrameLoopStats::default(),
        }
    }

    /// Executes one frame: publish, then `draw`.
    ///
    /// The first frame reports the target frame interval as its delta.
    pub fn frame(&mut self, draw: impl FnOnce(&FrameContext)) -> FrameResult {
        let frame_start = Instant::now();
        let delta = self
            .last_frame
            .map_or_else(|| self.config.frame_interval(), |last| frame_start - last);
        self.last_frame = Some(frame_start);
        self.frame_count += 1;

        // === PHASE 1: Publish ===
        let publish_start = Instant::now();
        let publish = self.scheduler.publish(delta);
        let publish_time = publish_start.elapsed();

        // === PHASE 2: Draw ===
        let draw_start = Instant::now();
        draw(&FrameContext {
            frame_number: self.frame_count,
            delta,
            publish,
        });
        let draw_time = draw_start.elapsed();

        // === PHASE 3: Finalize ===
        let total_us = micros(frame_start.elapsed());
        let over_budget = total_us > self.config.frame_budget_us;
        self.record(total_us, over_budget, &publish);

        if over_budget {
            tracing::debug!(
                frame = self.frame_count,
                frame_time_us = total_us,
                budget_us = self.config.frame_budget_us,
                "frame over budget"
            );
        }

        FrameResult {
            frame_number: self.frame_count,
            frame_time_us: total_us,
            publish_us: micros(publish_time),
            draw_us: micros(draw_time),
            publish,
            over_budget,
        }
    }

    /// Sleeps for what is left of the target frame interval.
    ///
    /// Stand-in for vsync when rendering headless.
    pub fn pace(&self) {
        if let Some(last) = self.last_frame {
            let remaining = self.config.frame_interval().saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Returns the scheduler this loop publishes to
    #[must_use]
    pub fn scheduler(&self) -> &Arc<AnimationScheduler> {
        &self.scheduler
    }

    /// Returns the configuration
    #[must_use]
    pub fn config(&self) -> &RenderLoopConfig {
        &self.config
    }

    /// Returns statistics
    #[must_use]
    pub fn stats(&self) -> FrameLoopStats {
        self.stats
    }

    /// Returns the current frame count
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn record(&mut self, total_us: u32, over_budget: bool, publish: &PublishReport) {
        let stats = &mut self.stats;
        stats.total_frames += 1;
        self.total_frame_time_us += u64::from(total_us);
        stats.avg_frame_time_us =
            u32::try_from(self.total_frame_time_us / stats.total_frames).unwrap_or(u32::MAX);
        stats.worst_frame_time_us = stats.worst_frame_time_us.max(total_us);
        if over_budget {
            stats.frames_over_budget += 1;
        }
        if publish.consumed_step {
            stats.steps_consumed += 1;
        }
        stats.buffers_uploaded += u64::from(publish.buffers_uploaded);
    }
}

fn micros(duration: Duration) -> u32 {
    u32::try_from(duration.as_micros()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_animation::{BufferTarget, Capabilities, HostBuffer};
    use tandem_animation::Animation;
    use tandem_core::SchedulerConfig;

    struct Idle;

    impl Animation for Idle {
        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }
    }

    fn frame_loop() -> FrameLoop {
        let scheduler = Arc::new(AnimationScheduler::new(SchedulerConfig::default()));
        FrameLoop::new(RenderLoopConfig::default(), scheduler)
    }

    #[test]
    fn test_frame_numbers_and_first_delta() {
        let mut frames = frame_loop();
        let mut seen = Vec::new();

        let first = frames.frame(|ctx| seen.push((ctx.frame_number, ctx.delta)));
        let second = frames.frame(|ctx| seen.push((ctx.frame_number, ctx.delta)));

        assert_eq!(first.frame_number, 1);
        assert_eq!(second.frame_number, 2);
        assert_eq!(seen[0], (1, RenderLoopConfig::default().frame_interval()));
        assert!(seen[1].1 < Duration::from_secs(1));
        assert_eq!(frames.stats().total_frames, 2);
    }

    #[test]
    fn test_publish_runs_before_draw() {
        let mut frames = frame_loop();
        let device = HostBuffer::new(8);
        let id = device.id();
        let host = device.probe();
        frames
            .scheduler()
            .register(Arc::new(Idle), Some(BufferTarget::create(device)))
            .unwrap();
        frames.scheduler().buffer(id).unwrap().write(0, &[3; 8]);

        let result = frames.frame(|ctx| {
            assert_eq!(ctx.publish.buffers_uploaded, 1);
            assert_eq!(host.contents(), vec![3; 8]);
        });
        assert_eq!(result.publish.buffers_uploaded, 1);
        assert_eq!(frames.stats().buffers_uploaded, 1);
    }

    #[test]
    fn test_over_budget_is_counted() {
        let scheduler = Arc::new(AnimationScheduler::new(SchedulerConfig::default()));
        let config = RenderLoopConfig {
            frame_budget_us: 1,
            ..RenderLoopConfig::default()
        };
        let mut frames = FrameLoop::new(config, scheduler);

        let result = frames.frame(|_| std::thread::sleep(Duration::from_millis(2)));
        assert!(result.over_budget);
        assert!(result.draw_us >= 2_000);
        assert_eq!(frames.stats().frames_over_budget, 1);
    }

    #[test]
    fn test_frame_interval() {
        let config = RenderLoopConfig {
            target_fps: 50,
            ..RenderLoopConfig::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(20));
    }
}
