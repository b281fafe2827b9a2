//! Noise texture generation
//!
//! Produces the grayscale image the wave samples through `uNoiseTexture`.
//! Only the red channel is read by the shader, so a single luma channel is
//! enough.

use std::path::Path;

use glam::Vec2;
use image::GrayImage;
use noise::{NoiseFn, Perlin};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest accepted image edge in pixels
pub const MAX_NOISE_SIZE: u32 = 8192;

/// Settings for the generated noise image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseTextureConfig {
    /// Width and height in pixels
    pub size: u32,
    /// Base frequency over the unit square
    pub scale: f32,
    /// Number of fBm layers
    pub octaves: u32,
    pub seed: u32,
}

impl Default for NoiseTextureConfig {
    fn default() -> Self {
        Self {
            size: 256,
            scale: 4.0,
            octaves: 4,
            seed: 0,
        }
    }
}

/// Fractal Brownian motion over Perlin noise, normalized to 0..1
fn fbm(noise: &Perlin, uv: Vec2, config: &NoiseTextureConfig) -> f32 {
    let mut value = 0.0f32;
    let mut amplitude = 1.0f32;
    let mut frequency = config.scale;
    let mut max_value = 0.0f32;

    for _ in 0..config.octaves {
        let p = [
            uv.x as f64 * frequency as f64,
            uv.y as f64 * frequency as f64,
        ];
        value += noise.get(p) as f32 * amplitude;
        max_value += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }

    (value / max_value + 1.0) * 0.5
}

/// Render the noise image
pub fn generate(config: &NoiseTextureConfig) -> Result<GrayImage> {
    if config.size == 0 || config.size > MAX_NOISE_SIZE {
        return Err(Error::InvalidParameter(format!(
            "noise size must be in 1..={} (got {})",
            MAX_NOISE_SIZE, config.size
        )));
    }
    if config.octaves == 0 {
        return Err(Error::InvalidParameter("noise octaves must be > 0".into()));
    }
    if !config.scale.is_finite() || config.scale <= 0.0 {
        return Err(Error::InvalidParameter(
            "noise scale must be positive".into(),
        ));
    }

    let noise = Perlin::new(config.seed);
    let size = config.size as usize;
    let mut pixels = vec![0u8; size * size];

    pixels
        .par_chunks_mut(size)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                let uv = Vec2::new(x as f32 / size as f32, y as f32 / size as f32);
                let v = fbm(&noise, uv, config);
                *pixel = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        });

    GrayImage::from_raw(config.size, config.size, pixels)
        .ok_or_else(|| Error::InvalidParameter("noise buffer size mismatch".into()))
}

/// Render the noise image and write it as PNG
pub fn save_png(config: &NoiseTextureConfig, path: impl AsRef<Path>) -> Result<()> {
    let img = generate(config)?;
    img.save(path.as_ref())?;
    tracing::info!(
        "Wrote {}x{} noise texture to {}",
        config.size,
        config.size,
        path.as_ref().display()
    );
    Ok(())
}
