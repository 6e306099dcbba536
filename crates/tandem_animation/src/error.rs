//! # Scheduler Error Types
//!
//! All errors that can be returned by the animation scheduler.

use thiserror::Error;

use crate::animation::AnimationId;
use crate::buffer::BufferId;

/// Errors that can occur in the animation scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The animation is already registered with this scheduler.
    #[error("animation already registered as {0}")]
    AlreadyRegistered(AnimationId),

    /// The animation is not registered with this scheduler.
    #[error("animation is not registered")]
    NotRegistered,

    /// The target buffer id does not name a registered buffer.
    #[error("unknown target buffer {0}")]
    UnknownBuffer(BufferId),

    /// A free-running animation asked for a non-positive or non-finite rate.
    #[error("invalid frame rate for free-running animation: {0}")]
    InvalidFrameRate(f64),

    /// An OS thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The scheduler thread terminated by panicking.
    #[error("animation scheduler thread panicked")]
    ThreadPanicked,

    /// `shutdown()` was called from the scheduler thread itself.
    #[error("shutdown requested from the scheduler thread")]
    ShutdownFromSchedulerThread,
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
