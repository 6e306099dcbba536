//! # Engine Error Types

use thiserror::Error;

use tandem_animation::{SchedulerError, StepError};
use tandem_core::ConfigError;

/// Errors that can occur while setting up or running the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The animation scheduler refused an operation.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// An animation could not be built.
    #[error("animation error: {0}")]
    Animation(#[from] StepError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
