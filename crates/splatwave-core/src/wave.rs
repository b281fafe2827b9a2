//! Wave parameters and the per-frame clock

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use splatwave_shader::wave::{NOISE_TEXTURE_UNIFORM, TIME_UNIFORM, WAVE_PARAMS_UNIFORM};

/// Amplitude, spatial frequency and temporal speed of the wave
///
/// Uploaded as `uWaveParams` in that order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Peak vertical displacement in world units
    pub amplitude: f32,
    /// Scale applied to `center.xz` before sampling the noise texture
    pub frequency: f32,
    /// Phase advance per second
    pub speed: f32,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            amplitude: 0.1,
            frequency: 1.5,
            speed: 0.5,
        }
    }
}

impl WaveParams {
    pub fn new(amplitude: f32, frequency: f32, speed: f32) -> Self {
        Self {
            amplitude,
            frequency,
            speed,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.amplitude, self.frequency, self.speed)
    }

    /// CPU mirror of the shader's displacement for a noise sample at `time` seconds
    pub fn offset_at(self, noise: f32, time: f32) -> f32 {
        (noise * std::f32::consts::TAU + time * self.speed).sin() * self.amplitude
    }
}

impl From<WaveParams> for Vec3 {
    fn from(params: WaveParams) -> Self {
        params.to_vec3()
    }
}

/// Accumulates frame deltas into seconds
///
/// Never decreases: negative or non-finite deltas advance it by zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaveClock {
    elapsed: f64,
}

impl WaveClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `delta_ms` milliseconds and return the elapsed seconds
    pub fn advance(&mut self, delta_ms: f32) -> f32 {
        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.elapsed += f64::from(delta_ms) / 1000.0;
        }
        self.seconds()
    }

    pub fn seconds(&self) -> f32 {
        self.elapsed as f32
    }
}
