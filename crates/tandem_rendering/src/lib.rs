//! # TANDEM Rendering
//!
//! The render thread's half of the animation lockstep:
//! - [`FrameLoop`]: publishes animation buffers, then runs the frame's draw calls
//! - [`WgpuBuffer`]: a [`DeviceBuffer`](tandem_animation::DeviceBuffer) that
//!   uploads through a `wgpu::Queue`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RENDER THREAD                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FrameLoop::frame → publish(dt) → WgpuBuffer::upload        │
//! │        ↓                                  ↓                 │
//! │   draw callback  ←──────────  queue.write_buffer            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod frame_loop;
pub mod wgpu_buffer;

pub use frame_loop::{FrameContext, FrameLoop, FrameLoopStats, FrameResult, RenderLoopConfig};
pub use wgpu_buffer::{aligned_size, position_layout, WgpuBuffer};
