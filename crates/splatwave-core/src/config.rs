//! Wave effect configuration
//!
//! Stored as JSON. Every field is optional in the file and falls back to the
//! built-in value.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use splatwave_shader::wave::WAVE_ANCHOR;

use crate::wave::WaveParams;
use crate::{Error, Result};

/// Noise image bound to `uNoiseTexture`
pub const DEFAULT_NOISE_TEXTURE: &str = "/img/perlin.png";

/// Name given to the recompiled effect
pub const DEFAULT_EFFECT_NAME: &str = "splatWaveEffect";

/// Everything the applier needs beyond the mesh and scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Path of the noise texture, resolved by the host
    pub noise_texture: String,
    /// Initial `uWaveParams`
    pub params: WaveParams,
    /// Vertex statement the wave block is inserted after
    pub anchor: String,
    /// Name of the recompiled effect
    pub effect_name: String,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            noise_texture: DEFAULT_NOISE_TEXTURE.to_string(),
            params: WaveParams::default(),
            anchor: WAVE_ANCHOR.to_string(),
            effect_name: DEFAULT_EFFECT_NAME.to_string(),
        }
    }
}

impl WaveConfig {
    /// Check that the values can drive the effect
    pub fn validate(&self) -> Result<()> {
        if self.anchor.trim().is_empty() {
            return Err(Error::InvalidConfig("anchor must not be empty".into()));
        }
        if self.noise_texture.trim().is_empty() {
            return Err(Error::InvalidConfig("noise_texture must not be empty".into()));
        }
        if self.effect_name.trim().is_empty() {
            return Err(Error::InvalidConfig("effect_name must not be empty".into()));
        }

        let WaveParams {
            amplitude,
            frequency,
            speed,
        } = self.params;
        if !(amplitude.is_finite() && frequency.is_finite() && speed.is_finite()) {
            return Err(Error::InvalidConfig("wave params must be finite".into()));
        }
        if frequency < 0.0 || speed < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "frequency and speed must not be negative (got {}, {})",
                frequency, speed
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load a config file, using defaults when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
