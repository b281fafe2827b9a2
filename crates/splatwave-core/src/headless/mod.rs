//! In-process reference host
//!
//! Implements the [`host`](crate::host) traits without a GPU. Compilation is a
//! source-level check: both stages present, braces balanced, and every
//! requested uniform and sampler declared somewhere. Good enough to drive the
//! applier from the CLI and from tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use glam::Vec3;
use parking_lot::Mutex;

use crate::host::{
    CompileError, Effect, EffectDescriptor, EffectRef, Engine, Material, Renderable, Scene,
    TextureHandle, UniformValue,
};
use crate::observable::Observable;
use crate::{Error, Result};

/// Sample Gaussian splatting vertex stage, as generated by the host
pub const SPLAT_VERTEX_SHADER: &str = include_str!("shaders/gaussian_splatting.vertex.glsl");

/// Sample Gaussian splatting fragment stage
pub const SPLAT_FRAGMENT_SHADER: &str = include_str!("shaders/gaussian_splatting.fragment.glsl");

/// A compiled effect with optional source introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessEffect {
    name: String,
    vertex: Option<String>,
    fragment: Option<String>,
    attributes: Vec<String>,
    uniforms: Vec<String>,
    samplers: Vec<String>,
    defines: String,
}

impl HeadlessEffect {
    pub fn from_descriptor(descriptor: EffectDescriptor) -> Self {
        Self {
            name: descriptor.name,
            vertex: Some(descriptor.vertex_source),
            fragment: Some(descriptor.fragment_source),
            attributes: descriptor.attributes,
            uniforms: descriptor.uniforms,
            samplers: descriptor.samplers,
            defines: descriptor.defines,
        }
    }

    /// Replace the vertex stage source
    pub fn with_vertex_source(mut self, source: impl Into<String>) -> Self {
        self.vertex = Some(source.into());
        self
    }

    /// Hide both stage sources, as hosts without introspection do
    pub fn without_source(mut self) -> Self {
        self.vertex = None;
        self.fragment = None;
        self
    }
}

impl Effect for HeadlessEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn vertex_source(&self) -> Option<String> {
        self.vertex.clone()
    }

    fn fragment_source(&self) -> Option<String> {
        self.fragment.clone()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.clone()
    }

    fn uniform_names(&self) -> Vec<String> {
        self.uniforms.clone()
    }

    fn sampler_names(&self) -> Vec<String> {
        self.samplers.clone()
    }

    fn defines(&self) -> String {
        self.defines.clone()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Descriptor for the bundled Gaussian splatting shaders
pub fn splat_descriptor() -> EffectDescriptor {
    EffectDescriptor {
        name: "gaussianSplatting".to_string(),
        vertex_source: SPLAT_VERTEX_SHADER.to_string(),
        fragment_source: SPLAT_FRAGMENT_SHADER.to_string(),
        attributes: strings(&["position", "splatIndex0"]),
        uniforms: strings(&[
            "world",
            "view",
            "projection",
            "invViewport",
            "dataTextureSize",
            "focal",
            "kernelSize",
            "alphaCutoff",
        ]),
        samplers: strings(&[
            "covariancesATexture",
            "covariancesBTexture",
            "centersTexture",
            "colorsTexture",
        ]),
        defines: "#define SH_DEGREE 0\n".to_string(),
    }
}

/// Effect built from the bundled Gaussian splatting shaders
pub fn splat_effect() -> HeadlessEffect {
    HeadlessEffect::from_descriptor(splat_descriptor())
}

/// Names declared with `uniform <qualifiers> <type> <name>;`
fn declared_uniforms(source: &str) -> HashSet<String> {
    source
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("uniform "))
        .filter_map(|rest| rest.split(';').next())
        .filter_map(|decl| decl.split_whitespace().last())
        .map(|name| name.split('[').next().unwrap_or(name).to_string())
        .collect()
}

fn braces_balanced(source: &str) -> bool {
    let mut depth = 0i64;
    for c in source.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn check_descriptor(descriptor: &EffectDescriptor) -> Vec<String> {
    let mut errors = Vec::new();

    for (stage, source) in [
        ("vertex", &descriptor.vertex_source),
        ("fragment", &descriptor.fragment_source),
    ] {
        if source.trim().is_empty() {
            errors.push(format!("{} shader source is empty", stage));
        } else if !braces_balanced(source) {
            errors.push(format!("{} shader has unbalanced braces", stage));
        }
    }

    let mut declared = declared_uniforms(&descriptor.vertex_source);
    declared.extend(declared_uniforms(&descriptor.fragment_source));

    for name in descriptor.uniforms.iter().chain(&descriptor.samplers) {
        if !declared.contains(name) {
            errors.push(format!("'{}' : undeclared identifier", name));
        }
    }

    errors
}

/// Engine with a settable frame delta and a source-level compiler
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    delta_ms: Mutex<f32>,
    compilations: AtomicUsize,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_delta_time(&self, delta_ms: f32) {
        *self.delta_ms.lock() = delta_ms;
    }

    /// Number of compile requests, successful or not
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }
}

impl Engine for HeadlessEngine {
    fn delta_time_ms(&self) -> f32 {
        *self.delta_ms.lock()
    }

    fn compile_effect(&self, descriptor: EffectDescriptor) -> std::result::Result<EffectRef, CompileError> {
        self.compilations.fetch_add(1, Ordering::SeqCst);

        let errors = check_descriptor(&descriptor);
        if !errors.is_empty() {
            return Err(CompileError {
                effect: descriptor.name,
                errors,
            });
        }

        Ok(Arc::new(HeadlessEffect::from_descriptor(descriptor)))
    }
}

/// Shader material with an inspectable uniform table
pub struct HeadlessMaterial {
    name: String,
    effect: Mutex<Option<EffectRef>>,
    uniforms: Mutex<HashMap<String, UniformValue>>,
    effect_created: Observable<EffectRef>,
    installs: AtomicUsize,
}

impl HeadlessMaterial {
    /// A material whose effect is still compiling
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            effect: Mutex::new(None),
            uniforms: Mutex::new(HashMap::new()),
            effect_created: Observable::new(),
            installs: AtomicUsize::new(0),
        }
    }

    /// A material with an already compiled effect
    pub fn with_effect(name: impl Into<String>, effect: EffectRef) -> Self {
        let material = Self::new(name);
        *material.effect.lock() = Some(effect);
        material
    }

    /// Complete the pending compilation and notify observers
    pub fn finish_compilation(&self, effect: EffectRef) {
        *self.effect.lock() = Some(Arc::clone(&effect));
        self.effect_created.notify(&effect);
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.lock().get(name).cloned()
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.uniform(name).and_then(|v| v.as_float())
    }

    pub fn vector3(&self, name: &str) -> Option<Vec3> {
        self.uniform(name).and_then(|v| v.as_vec3())
    }

    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.uniform(name).and_then(|v| v.as_texture().cloned())
    }

    /// Number of `set_effect` calls
    pub fn effect_installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

impl Material for HeadlessMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn effect(&self) -> Option<EffectRef> {
        self.effect.lock().clone()
    }

    fn on_effect_created(&self) -> &Observable<EffectRef> {
        &self.effect_created
    }

    fn set_effect(&self, effect: EffectRef) {
        *self.effect.lock() = Some(effect);
        self.installs.fetch_add(1, Ordering::SeqCst);
    }

    fn set_uniform(&self, name: &str, value: UniformValue) {
        self.uniforms.lock().insert(name.to_string(), value);
    }
}

/// A named renderable with an optional material
pub struct HeadlessMesh {
    name: String,
    material: Option<Arc<dyn Material>>,
}

impl HeadlessMesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            material: None,
        }
    }

    pub fn with_material(mut self, material: Arc<dyn Material>) -> Self {
        self.material = Some(material);
        self
    }
}

impl Renderable for HeadlessMesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn material(&self) -> Option<Arc<dyn Material>> {
        self.material.clone()
    }
}

/// Scene driving a manual render loop
pub struct HeadlessScene {
    engine: Arc<HeadlessEngine>,
    before_render: Observable<()>,
    asset_root: Option<PathBuf>,
    next_texture_id: AtomicU64,
    frames: AtomicU64,
}

impl HeadlessScene {
    pub fn new(engine: Arc<HeadlessEngine>) -> Self {
        Self {
            engine,
            before_render: Observable::new(),
            asset_root: None,
            next_texture_id: AtomicU64::new(1),
            frames: AtomicU64::new(0),
        }
    }

    /// Resolve texture paths against `root` and require the files to exist
    ///
    /// Without a root, textures load lazily and never fail.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn headless_engine(&self) -> &Arc<HeadlessEngine> {
        &self.engine
    }

    /// Run one frame: publish `delta_ms`, then notify before-render observers
    pub fn render_frame(&self, delta_ms: f32) {
        self.engine.set_delta_time(delta_ms);
        self.frames.fetch_add(1, Ordering::SeqCst);
        self.before_render.notify(&());
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

impl Scene for HeadlessScene {
    fn engine(&self) -> Arc<dyn Engine> {
        self.engine.clone()
    }

    fn on_before_render(&self) -> &Observable<()> {
        &self.before_render
    }

    fn load_texture(&self, path: &str) -> Result<TextureHandle> {
        let id = self.next_texture_id.fetch_add(1, Ordering::SeqCst);

        let size = match &self.asset_root {
            None => None,
            Some(root) => {
                let file = root.join(path.trim_start_matches('/'));
                let dimensions =
                    image::image_dimensions(&file).map_err(|e| Error::TextureLoad {
                        path: path.to_string(),
                        reason: e.to_string(),
                    })?;
                Some(dimensions)
            }
        };

        Ok(TextureHandle {
            id,
            path: path.to_string(),
            size,
        })
    }
}
