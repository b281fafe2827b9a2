//! # Splatwave Core
//!
//! Noise-driven wave displacement for Gaussian splat materials.
//!
//! The host rendering engine owns every object involved: meshes, materials,
//! compiled effects, textures and the render loop. This crate only talks to
//! them through the traits in [`host`], patches the material's vertex stage,
//! recompiles it, binds the wave uniforms and keeps the time uniform moving
//! once per rendered frame.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use splatwave_core::prelude::*;
//!
//! let handle = apply_splat_wave(&mesh, &scene)?;
//!
//! // later, to stop the per-frame update
//! handle.stop();
//! ```
//!
//! ## Conventions
//!
//! - **Time**: host frame deltas are milliseconds, the `uTime` uniform is seconds
//! - **Coordinate system**: Y-up, the wave lifts splat centers along Y

pub mod applier;
pub mod config;
pub mod headless;
pub mod host;
pub mod noise;
pub mod observable;
pub mod wave;

mod error;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    // Applying the effect
    pub use crate::applier::{SplatWave, WaveHandle, WaveStatus, apply_splat_wave};

    // Host object model
    pub use crate::host::{
        CompileError, Effect, EffectDescriptor, EffectRef, Engine, Material, Renderable, Scene,
        TextureHandle, UniformValue,
    };
    pub use crate::observable::{Observable, Subscription};

    // Parameters and configuration
    pub use crate::config::WaveConfig;
    pub use crate::wave::{WaveClock, WaveParams};

    // Math (re-export glam)
    pub use glam::Vec3;

    // Error handling
    pub use crate::{Error, Result};
}
