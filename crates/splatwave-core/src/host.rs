//! Host engine object model
//!
//! The wave effect never owns engine objects. Meshes, materials, effects and
//! scenes are shared as `Arc<dyn _>` and mutated through `&self`, matching the
//! callback-driven model of the engines this plugs into.

use std::sync::Arc;

use glam::Vec3;
use thiserror::Error;

use crate::observable::Observable;

/// Shared handle to a compiled shader effect
pub type EffectRef = Arc<dyn Effect>;

/// A compiled vertex + fragment program with introspectable inputs
pub trait Effect: Send + Sync {
    fn name(&self) -> &str;

    /// Vertex stage source, if the host exposes it
    fn vertex_source(&self) -> Option<String>;

    /// Fragment stage source, if the host exposes it
    fn fragment_source(&self) -> Option<String>;

    fn attribute_names(&self) -> Vec<String>;

    fn uniform_names(&self) -> Vec<String>;

    fn sampler_names(&self) -> Vec<String>;

    /// Preprocessor defines, one `#define` per line
    fn defines(&self) -> String;
}

/// Everything the host needs to build a new effect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectDescriptor {
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
    pub attributes: Vec<String>,
    pub uniforms: Vec<String>,
    pub samplers: Vec<String>,
    pub defines: String,
}

/// Compilation failure reported by the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{effect}: {}", .errors.join("; "))]
pub struct CompileError {
    pub effect: String,
    pub errors: Vec<String>,
}

/// Engine-wide services
pub trait Engine: Send + Sync {
    /// Duration of the last frame in milliseconds
    fn delta_time_ms(&self) -> f32;

    /// Compile a new effect. The caller decides whether to install it.
    fn compile_effect(&self, descriptor: EffectDescriptor) -> Result<EffectRef, CompileError>;
}

/// A texture known to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureHandle {
    pub id: u64,
    pub path: String,
    /// Pixel dimensions, once known
    pub size: Option<(u32, u32)>,
}

/// Value bound to a named uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3(Vec3),
    Texture(TextureHandle),
}

impl UniformValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureHandle> {
        match self {
            Self::Texture(t) => Some(t),
            _ => None,
        }
    }
}

/// A shader-based material
pub trait Material: Send + Sync {
    fn name(&self) -> &str;

    /// The compiled effect, or `None` while compilation is still pending
    fn effect(&self) -> Option<EffectRef>;

    /// Fires when the host finishes compiling the material's effect
    fn on_effect_created(&self) -> &Observable<EffectRef>;

    /// Replace the active effect
    fn set_effect(&self, effect: EffectRef);

    fn set_uniform(&self, name: &str, value: UniformValue);

    fn set_float(&self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    fn set_vector3(&self, name: &str, value: Vec3) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    fn set_texture(&self, name: &str, texture: TextureHandle) {
        self.set_uniform(name, UniformValue::Texture(texture));
    }
}

/// Anything drawn with a material
pub trait Renderable {
    fn name(&self) -> &str;

    fn material(&self) -> Option<Arc<dyn Material>>;
}

/// The scene owning the render loop
pub trait Scene: Send + Sync {
    fn engine(&self) -> Arc<dyn Engine>;

    /// Fires once before every rendered frame
    fn on_before_render(&self) -> &Observable<()>;

    /// Load a texture asset by path
    fn load_texture(&self, path: &str) -> crate::Result<TextureHandle>;
}
