//! The animation capability interface.
//!
//! An animation is a unit of work with two independent capabilities:
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │      CPU step        │        │      GPU step        │
//! │  scheduler thread    │        │   render thread      │
//! │  pure computation    │        │  graphics context    │
//! │  writes staging buf  │        │  runs from publish() │
//! └──────────────────────┘        └──────────────────────┘
//! ```
//!
//! Capabilities are queried every cycle, so a finished one-shot animation can
//! drop its CPU step and still receive a final GPU step.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::buffer::AnimationBuffer;

/// Shared handle to an animation.
///
/// The application keeps one clone, the scheduler keeps another. The
/// animation is destroyed when both are gone.
pub type AnimationRef = Arc<dyn Animation>;

/// Which step functions an animation wants called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    /// Call [`Animation::step_cpu`] on the scheduler thread.
    pub cpu: bool,
    /// Call [`Animation::step_gpu`] from `publish()` on the render thread.
    pub gpu: bool,
}

impl Capabilities {
    /// Neither step. The animation stays registered but idle.
    pub const NONE: Self = Self::new(false, false);
    /// CPU step only.
    pub const CPU: Self = Self::new(true, false);
    /// GPU step only.
    pub const GPU: Self = Self::new(false, true);
    /// Both steps.
    pub const BOTH: Self = Self::new(true, true);

    /// Creates a capability set.
    #[must_use]
    pub const fn new(cpu: bool, gpu: bool) -> Self {
        Self { cpu, gpu }
    }
}

/// How an animation's CPU step is paced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Pacing {
    /// Stepped by the scheduler thread, in lockstep with rendered frames.
    #[default]
    Lockstep,
    /// Stepped by a dedicated thread at a fixed rate, independent of rendering.
    FreeRunning {
        /// Target CPU steps per second.
        frames_per_second: f64,
    },
}

impl Pacing {
    /// Returns the target interval between steps of a free-running animation.
    #[must_use]
    pub fn frame_interval(&self) -> Option<Duration> {
        match *self {
            Self::Lockstep => None,
            Self::FreeRunning { frames_per_second } => {
                Some(Duration::from_secs_f64(1.0 / frames_per_second))
            }
        }
    }

    /// Returns true for [`Pacing::Lockstep`].
    #[must_use]
    pub fn is_lockstep(&self) -> bool {
        matches!(self, Self::Lockstep)
    }
}

/// Failure reported by a single step of a single animation.
///
/// A step error never stops the schedule: the scheduler logs it and skips
/// the animation for that cycle only.
#[derive(Error, Debug)]
pub enum StepError {
    /// The animation writes into a GPU buffer but was registered without one.
    #[error("animation requires a target buffer but none is attached")]
    MissingBuffer,

    /// Animation-specific failure.
    #[error("{0}")]
    Failed(String),
}

impl StepError {
    /// Builds a [`StepError::Failed`] from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A schedulable animation.
///
/// Implementations are shared between threads and therefore take `&self`;
/// mutable simulation state lives behind interior mutability.
///
/// ## Thread affinity
///
/// - [`step_cpu`](Self::step_cpu) runs on the scheduler thread (or on the
///   animation's own thread when [`Pacing::FreeRunning`]). It must not touch
///   graphics-context state.
/// - [`step_gpu`](Self::step_gpu) runs on the render thread, inside
///   `AnimationScheduler::publish`.
pub trait Animation: Send + Sync {
    /// Which steps to run this cycle.
    fn capabilities(&self) -> Capabilities;

    /// Advances the simulation by `dt`, writing results into `buffer`.
    ///
    /// `buffer` is the staging buffer this animation was registered against,
    /// if any.
    ///
    /// # Errors
    ///
    /// Any error skips this animation for the current cycle.
    fn step_cpu(&self, dt: Duration, buffer: Option<&AnimationBuffer>) -> Result<(), StepError> {
        let _ = (dt, buffer);
        Ok(())
    }

    /// Issues graphics-context work for the frame being published.
    ///
    /// # Errors
    ///
    /// Any error skips this animation for the current frame.
    fn step_gpu(&self, dt: Duration) -> Result<(), StepError> {
        let _ = dt;
        Ok(())
    }

    /// How the CPU step is paced. Read once, at registration.
    fn pacing(&self) -> Pacing {
        Pacing::Lockstep
    }

    /// Name used in log output.
    fn name(&self) -> &str {
        "animation"
    }
}

/// Identifier handed out by the scheduler at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(pub(crate) u64);

impl AnimationId {
    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim#{}", self.0)
    }
}

/// Pointer identity of a shared animation.
///
/// Stable while the scheduler holds a clone of the `Arc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AnimationKey(usize);

impl AnimationKey {
    pub(crate) fn of(animation: &AnimationRef) -> Self {
        Self(Arc::as_ptr(animation).cast::<()>() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Animation for Idle {
        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }
    }

    #[test]
    fn test_default_steps_succeed() {
        let idle = Idle;
        assert!(idle.step_cpu(Duration::from_millis(16), None).is_ok());
        assert!(idle.step_gpu(Duration::from_millis(16)).is_ok());
        assert!(idle.pacing().is_lockstep());
    }

    #[test]
    fn test_key_is_pointer_identity() {
        let a: AnimationRef = Arc::new(Idle);
        let b: AnimationRef = Arc::new(Idle);
        let a2 = Arc::clone(&a);

        assert_eq!(AnimationKey::of(&a), AnimationKey::of(&a2));
        assert_ne!(AnimationKey::of(&a), AnimationKey::of(&b));
    }

    #[test]
    fn test_frame_interval() {
        let pacing = Pacing::FreeRunning {
            frames_per_second: 50.0,
        };
        assert_eq!(pacing.frame_interval(), Some(Duration::from_millis(20)));
        assert_eq!(Pacing::Lockstep.frame_interval(), None);
    }
}
