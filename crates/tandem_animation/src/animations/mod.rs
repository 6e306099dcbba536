//! Ready-made animations.

mod wave;

pub use wave::{Wave, WaveAnimation, WaveShape};
