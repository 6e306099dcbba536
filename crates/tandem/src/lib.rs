//! # TANDEM
//!
//! Engine context tying the animation scheduler to a render loop.
//!
//! ## Example
//!
//! ```rust
//! use tandem::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.start().unwrap();
//! for _ in 0..3 {
//!     engine.frame(|_ctx| {
//!         // draw calls go here
//!     });
//! }
//! engine.shutdown().unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
