//! # TANDEM Animation
//!
//! Steps animations on a background thread and keeps GPU buffers in sync
//! with the render thread:
//! - The [`Animation`] trait: a CPU step off the render thread, a GPU step on it
//! - [`AnimationBuffer`]: CPU-visible staging for one GPU buffer, dirty-span uploads
//! - [`AnimationScheduler`]: lockstep handshake, never more than one step ahead
//!
//! ## Threads
//!
//! 1. **Render thread** owns the graphics context and calls
//!    [`AnimationScheduler::publish`] once per frame
//! 2. **Scheduler thread** owns the live set and runs CPU steps
//! 3. **Any thread** may register and unregister animations
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tandem_animation::animations::{Wave, WaveAnimation};
//! use tandem_animation::{AnimationScheduler, BufferTarget, HostBuffer};
//! use tandem_core::SchedulerConfig;
//!
//! let scheduler = AnimationScheduler::new(SchedulerConfig::default());
//! scheduler.start().unwrap();
//!
//! let waves = WaveAnimation::new(vec![[0.0; 3]; 64], vec![[0.0, 1.0, 0.0]; 64]).unwrap();
//! waves.add_wave(Wave::radial([0.0; 3]));
//! let device = HostBuffer::new(waves.byte_len());
//! scheduler.register(Arc::new(waves), Some(BufferTarget::create(device))).unwrap();
//!
//! scheduler.publish(Duration::from_millis(16));
//! scheduler.shutdown().unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod animation;
pub mod animations;
pub mod buffer;
pub mod device;
pub mod error;
mod free_running;
mod registry;
pub mod scheduler;
pub mod stats;

pub use animation::{Animation, AnimationId, AnimationRef, Capabilities, Pacing, StepError};
pub use buffer::{AnimationBuffer, BufferId, BufferState, BufferTarget, DeviceBuffer};
pub use device::{HostBuffer, HostBufferProbe};
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::AnimationScheduler;
pub use stats::{PublishReport, SchedulerStats};
