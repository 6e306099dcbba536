//! # Synchronization Primitives for the Scheduler/Render Handshake
//!
//! ## The Problem
//!
//! ```text
//! Scheduler thread:  WRITE animation results into staging buffers
//! Render thread:     UPLOAD staging buffers to the GPU, then draw
//!
//! Without synchronization: scheduler races ahead, frames tear
//! With one big lock:       render thread stalls behind CPU steps
//! ```
//!
//! ## The Solution: Lockstep Signals
//!
//! ```text
//! Scheduler: step N ──► raise(step_ready) ──► wait(frame_consumed) ──► step N+1
//! Render:                 take(step_ready) ──► publish ──► raise(frame_consumed)
//! ```
//!
//! Each direction owns one [`Signal`]. The scheduler can never be more than
//! one step ahead of the frames the render thread consumed.

mod signal;

pub use signal::Signal;
