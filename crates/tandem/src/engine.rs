//! The engine context.
//!
//! One [`Engine`] per graphics context. It owns the animation scheduler that
//! scene objects register with, and the frame loop the render thread drives.

use std::sync::Arc;

use tandem_animation::AnimationScheduler;
use tandem_rendering::{FrameContext, FrameLoop, FrameResult};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// Scheduler plus frame loop.
pub struct Engine {
    config: EngineConfig,
    scheduler: Arc<AnimationScheduler>,
    frames: FrameLoop,
}

impl Engine {
    /// Builds an engine. The scheduler thread is not started yet.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let scheduler = Arc::new(AnimationScheduler::new(config.scheduler.clone()));
        let frames = FrameLoop::new(config.render.clone(), Arc::clone(&scheduler));
        Ok(Self {
            config,
            scheduler,
            frames,
        })
    }

    /// Starts the scheduler thread. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns a scheduler error if the thread cannot be spawned.
    pub fn start(&self) -> EngineResult<()> {
        self.scheduler.start()?;
        tracing::info!(
            target_fps = self.config.render.target_fps,
            "engine started"
        );
        Ok(())
    }

    /// Renders one frame. Call from the thread that owns the graphics context.
    pub fn frame(&mut self, draw: impl FnOnce(&FrameContext)) -> FrameResult {
        self.frames.frame(draw)
    }

    /// Sleeps out the rest of the target frame interval.
    pub fn pace(&self) {
        self.frames.pace();
    }

    /// The scheduler, for registering animations from any thread.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<AnimationScheduler> {
        &self.scheduler
    }

    /// The frame loop.
    #[must_use]
    pub fn frame_loop(&self) -> &FrameLoop {
        &self.frames
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stops the scheduler thread and releases every registration.
    ///
    /// # Errors
    ///
    /// Returns a scheduler error if the scheduler thread panicked.
    pub fn shutdown(&self) -> EngineResult<()> {
        self.scheduler.shutdown()?;
        let stats = self.frames.stats();
        tracing::info!(
            frames = stats.total_frames,
            steps_consumed = stats.steps_consumed,
            avg_frame_time_us = stats.avg_frame_time_us,
            "engine stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use tandem_core::ConfigError;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.scheduler.idle_interval_ms = 0;
        assert!(matches!(
            Engine::new(config),
            Err(EngineError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_start_and_shutdown() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.start().unwrap();
        assert!(engine.scheduler().is_running());
        engine.shutdown().unwrap();
        assert!(!engine.scheduler().is_running());
    }
}
