//! # TANDEM Core
//!
//! Building blocks shared by the animation scheduler and the render loop:
//! - Single-slot [`Signal`]s for the two-thread lockstep handshake
//! - [`Clock`] sources sampled once per scheduler iteration
//! - [`SchedulerConfig`] and TOML loading helpers
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tandem_core::Signal;
//!
//! let ready = Arc::new(Signal::new());
//! let remote = Arc::clone(&ready);
//! let worker = std::thread::spawn(move || remote.raise());
//! ready.wait();
//! worker.join().unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod clock;
pub mod config;
pub mod error;
pub mod sync;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{load_toml, parse_toml, SchedulerConfig};
pub use error::{ConfigError, ConfigResult};
pub use sync::Signal;
