//! Sine-wave vertex displacement.
//!
//! Every CPU step displaces each rest-pose vertex along its rest normal by the
//! sum of all active wave heights, then writes the new positions into the
//! animation's buffer as tightly packed `[f32; 3]`.

use std::f64::consts::{PI, TAU};
use std::time::Duration;

use parking_lot::Mutex;

use crate::animation::{Animation, Capabilities, StepError};
use crate::buffer::AnimationBuffer;

/// Where a wave's phase is measured from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveShape {
    /// Parallel wave fronts travelling along a direction.
    Directional {
        /// Travel direction. Normalized on construction.
        direction: [f32; 3],
    },
    /// Circular wave fronts spreading from a point.
    Radial {
        /// Wave source.
        origin: [f32; 3],
    },
}

/// One travelling sine wave.
#[derive(Debug, Clone, PartialEq)]
pub struct Wave {
    shape: WaveShape,
    /// Peak displacement.
    pub amplitude: f64,
    /// Distance between a crest and the next trough.
    pub width: f64,
    /// Phase speed in radians per second.
    pub velocity: f64,
    /// Seconds left to live. `None` lives forever.
    pub lifetime: Option<f64>,
    phase: f64,
}

impl Wave {
    /// Creates an endless wave with amplitude 1, width 1 and velocity 4.
    #[must_use]
    pub fn new(shape: WaveShape) -> Self {
        let shape = match shape {
            WaveShape::Directional { direction } => WaveShape::Directional {
                direction: normalize(direction),
            },
            radial @ WaveShape::Radial { .. } => radial,
        };
        Self {
            shape,
            amplitude: 1.0,
            width: 1.0,
            velocity: 4.0,
            lifetime: None,
            phase: 0.0,
        }
    }

    /// Directional wave along `direction`.
    #[must_use]
    pub fn directional(direction: [f32; 3]) -> Self {
        Self::new(WaveShape::Directional { direction })
    }

    /// Radial wave spreading from `origin`.
    #[must_use]
    pub fn radial(origin: [f32; 3]) -> Self {
        Self::new(WaveShape::Radial { origin })
    }

    /// Sets the amplitude.
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Sets the width.
    #[must_use]
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    /// Sets the velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    /// Limits the wave to `seconds`.
    #[must_use]
    pub fn with_lifetime(mut self, seconds: f64) -> Self {
        self.lifetime = Some(seconds);
        self
    }

    /// Returns the wave shape.
    #[must_use]
    pub fn shape(&self) -> WaveShape {
        self.shape
    }

    /// Advances the phase. Returns false once the lifetime has run out.
    fn advance(&mut self, seconds: f64) -> bool {
        self.phase = (self.phase + seconds * self.velocity).rem_euclid(TAU);
        match self.lifetime.as_mut() {
            Some(left) => {
                *left -= seconds;
                *left > 0.0
            }
            None => true,
        }
    }

    /// Wave height at a rest-pose vertex.
    fn height(&self, vertex: [f32; 3]) -> f64 {
        let distance = match self.shape {
            WaveShape::Directional { direction } => f64::from(dot(direction, vertex)),
            WaveShape::Radial { origin } => f64::from(length(sub(vertex, origin))),
        };
        self.amplitude * (PI / self.width * distance + self.phase).sin()
    }
}

struct WaveState {
    waves: Vec<Wave>,
    positions: Vec<[f32; 3]>,
}

/// Displaces a vertex buffer with a set of [`Wave`]s.
///
/// ```rust
/// use tandem_animation::animations::{Wave, WaveAnimation};
///
/// let rest = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
/// let normals = vec![[0.0, 1.0, 0.0]; 2];
/// let animation = WaveAnimation::new(rest, normals).unwrap();
/// animation.add_wave(Wave::directional([1.0, 0.0, 0.0]).with_amplitude(0.25));
/// assert_eq!(animation.wave_count(), 1);
/// ```
pub struct WaveAnimation {
    rest: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    offset: usize,
    state: Mutex<WaveState>,
}

impl WaveAnimation {
    /// Creates an animation for the given rest pose.
    ///
    /// # Errors
    ///
    /// Returns an error if `rest` and `normals` differ in length.
    pub fn new(rest: Vec<[f32; 3]>, normals: Vec<[f32; 3]>) -> Result<Self, StepError> {
        if rest.len() != normals.len() {
            return Err(StepError::msg(format!(
                "{} positions but {} normals",
                rest.len(),
                normals.len()
            )));
        }
        Ok(Self {
            state: Mutex::new(WaveState {
                waves: Vec::new(),
                positions: rest.clone(),
            }),
            rest,
            normals,
            offset: 0,
        })
    }

    /// Writes positions starting at byte `offset` of the target buffer.
    #[must_use]
    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Bytes this animation writes into its buffer.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.rest.len() * std::mem::size_of::<[f32; 3]>()
    }

    /// Adds a wave.
    pub fn add_wave(&self, wave: Wave) {
        self.state.lock().waves.push(wave);
    }

    /// Removes all waves. The vertices keep their last displaced positions.
    pub fn clear_waves(&self) {
        self.state.lock().waves.clear();
    }

    /// Number of waves still alive.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.state.lock().waves.len()
    }

    /// Copy of the last computed positions.
    #[must_use]
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.state.lock().positions.clone()
    }
}

impl Animation for WaveAnimation {
    fn capabilities(&self) -> Capabilities {
        Capabilities::CPU
    }

    fn step_cpu(&self, dt: Duration, buffer: Option<&AnimationBuffer>) -> Result<(), StepError> {
        let buffer = buffer.ok_or(StepError::MissingBuffer)?;
        let mut state = self.state.lock();
        if state.waves.is_empty() {
            return Ok(());
        }

        let seconds = dt.as_secs_f64();
        let WaveState { waves, positions } = &mut *state;
        for ((position, &rest), &normal) in positions.iter_mut().zip(&self.rest).zip(&self.normals) {
            let height: f64 = waves.iter().map(|wave| wave.height(rest)).sum();
            #[allow(clippy::cast_possible_truncation)]
            let height = height as f32;
            *position = add(rest, scale(normal, height));
        }
        waves.retain_mut(|wave| wave.advance(seconds));

        buffer.write_pod(self.offset, positions.as_slice());
        Ok(())
    }

    fn name(&self) -> &str {
        "wave"
    }
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(v: [f32; 3], s: f32) -> [f32; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn length(v: [f32; 3]) -> f32 {
    dot(v, v).sqrt()
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = length(v);
    if len > f32::EPSILON {
        scale(v, 1.0 / len)
    } else {
        v
    }
}
