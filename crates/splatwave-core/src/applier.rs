//! Installs the wave patch on a splat material
//!
//! Installation is a transaction: the patched effect is compiled and the
//! noise texture loaded before anything on the material changes. If either
//! step fails the previous effect stays installed.

use std::sync::Arc;

use parking_lot::Mutex;
use splatwave_shader::VertexPatch;
use splatwave_shader::wave::wave_patch;

use crate::config::WaveConfig;
use crate::host::{Effect, EffectDescriptor, EffectRef, Material, Renderable, Scene};
use crate::observable::Subscription;
use crate::wave::{NOISE_TEXTURE_UNIFORM, TIME_UNIFORM, WAVE_PARAMS_UNIFORM, WaveClock};
use crate::{Error, Result};

/// Where a wave installation currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveStatus {
    /// Waiting for the material's first effect
    Pending,
    /// Installed and updating every frame
    Applied,
    /// The vertex stage already declares the wave uniforms; nothing was changed
    AlreadyPatched,
    /// The host does not expose shader sources; nothing was changed
    SourceUnavailable,
    /// Deferred installation failed; the previous effect is still active
    Failed(String),
    /// Stopped through [`WaveHandle::stop`]
    Stopped,
}

#[derive(Debug)]
struct HandleState {
    status: WaveStatus,
    pending: Option<Subscription>,
    frame: Option<Subscription>,
}

/// Control handle for one wave installation
///
/// Clones share state. Dropping every clone leaves the effect running for
/// the lifetime of the scene; call [`WaveHandle::stop`] to end it.
#[derive(Debug, Clone)]
pub struct WaveHandle {
    state: Arc<Mutex<HandleState>>,
    clock: Arc<Mutex<WaveClock>>,
}

impl WaveHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HandleState {
                status: WaveStatus::Pending,
                pending: None,
                frame: None,
            })),
            clock: Arc::new(Mutex::new(WaveClock::new())),
        }
    }

    pub fn status(&self) -> WaveStatus {
        self.state.lock().status.clone()
    }

    /// Whether the per-frame update is registered
    pub fn is_running(&self) -> bool {
        self.state.lock().status == WaveStatus::Applied
    }

    /// Seconds accumulated by the per-frame update
    pub fn elapsed_seconds(&self) -> f32 {
        self.clock.lock().seconds()
    }

    /// Unregister the per-frame update, or the pending one-shot hook if the
    /// effect has not been created yet
    ///
    /// The patched effect and its uniforms stay on the material.
    pub fn stop(&self) {
        let (pending, frame) = {
            let mut state = self.state.lock();
            if matches!(state.status, WaveStatus::Pending | WaveStatus::Applied) {
                state.status = WaveStatus::Stopped;
            }
            (state.pending.take(), state.frame.take())
        };

        for subscription in pending.iter().chain(frame.iter()) {
            subscription.unsubscribe();
        }
    }

    fn is_stopped(&self) -> bool {
        self.state.lock().status == WaveStatus::Stopped
    }

    fn set_status(&self, status: WaveStatus) {
        self.state.lock().status = status;
    }

    fn set_pending(&self, subscription: Subscription) {
        let mut state = self.state.lock();
        if state.status == WaveStatus::Pending {
            state.pending = Some(subscription);
        } else {
            drop(state);
            subscription.unsubscribe();
        }
    }

    fn start(&self, subscription: Subscription) {
        let mut state = self.state.lock();
        if state.status == WaveStatus::Stopped {
            drop(state);
            subscription.unsubscribe();
            return;
        }
        state.status = WaveStatus::Applied;
        state.pending = None;
        state.frame = Some(subscription);
    }
}

/// Applies the noise-driven wave to splat materials
#[derive(Debug, Clone)]
pub struct SplatWave {
    config: WaveConfig,
    patch: VertexPatch,
}

impl Default for SplatWave {
    fn default() -> Self {
        Self::new(WaveConfig::default())
    }
}

impl SplatWave {
    pub fn new(config: WaveConfig) -> Self {
        let patch = wave_patch(&config.anchor);
        Self { config, patch }
    }

    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    /// The vertex patch built from the configured anchor
    pub fn patch(&self) -> &VertexPatch {
        &self.patch
    }

    /// Apply the wave to `mesh`'s material
    ///
    /// If the material's effect is already compiled the wave is installed
    /// before this returns; otherwise installation happens once, when the
    /// host reports the effect. A missing material, or a failure on the
    /// immediate path, is returned as an error with the material untouched.
    /// So is a config that fails [`WaveConfig::validate`].
    pub fn apply(&self, mesh: &dyn Renderable, scene: &Arc<dyn Scene>) -> Result<WaveHandle> {
        self.config.validate().inspect_err(|e| {
            tracing::error!("Cannot apply wave effect to `{}`: {}", mesh.name(), e);
        })?;

        let Some(material) = mesh.material() else {
            tracing::error!(
                "Cannot apply wave effect: mesh `{}` has no material",
                mesh.name()
            );
            return Err(Error::MissingMaterial(mesh.name().to_string()));
        };

        let handle = WaveHandle::new();

        if let Some(effect) = material.effect() {
            self.install(&material, scene, &effect, &handle)?;
            return Ok(handle);
        }

        tracing::debug!(
            "Effect for material `{}` not compiled yet, deferring wave setup",
            material.name()
        );

        let installer = self.clone();
        let weak_material = Arc::downgrade(&material);
        let weak_scene = Arc::downgrade(scene);
        let deferred = handle.clone();

        let subscription = material
            .on_effect_created()
            .add_once(move |effect: &EffectRef| {
                let (Some(material), Some(scene)) = (weak_material.upgrade(), weak_scene.upgrade())
                else {
                    tracing::debug!("Material or scene dropped before its effect was created");
                    deferred.set_status(WaveStatus::Failed("scene or material dropped".into()));
                    return;
                };
                if deferred.is_stopped() {
                    return;
                }
                if let Err(e) = installer.install(&material, &scene, effect, &deferred) {
                    deferred.set_status(WaveStatus::Failed(e.to_string()));
                }
            });

        handle.set_pending(subscription);
        Ok(handle)
    }

    fn install(
        &self,
        material: &Arc<dyn Material>,
        scene: &Arc<dyn Scene>,
        effect: &EffectRef,
        handle: &WaveHandle,
    ) -> Result<()> {
        let (Some(vertex), Some(fragment)) = (effect.vertex_source(), effect.fragment_source())
        else {
            tracing::debug!(
                "Effect `{}` does not expose its sources, skipping wave",
                effect.name()
            );
            handle.set_status(WaveStatus::SourceUnavailable);
            return Ok(());
        };

        if self.patch.is_applied(&vertex) {
            tracing::debug!("Effect `{}` already carries the wave", effect.name());
            handle.set_status(WaveStatus::AlreadyPatched);
            return Ok(());
        }

        let patched = self.patch.apply(&vertex).inspect_err(|e| {
            tracing::error!("Cannot patch effect `{}`: {}", effect.name(), e);
        })?;

        let descriptor = self.descriptor(effect.as_ref(), patched, fragment);
        let engine = scene.engine();
        let compiled = engine.compile_effect(descriptor).inspect_err(|e| {
            tracing::error!("Error compiling wave shader: {}", e);
        })?;

        let noise = scene
            .load_texture(&self.config.noise_texture)
            .inspect_err(|e| tracing::error!("{}", e))?;

        material.set_effect(compiled);
        material.set_texture(NOISE_TEXTURE_UNIFORM, noise);
        material.set_vector3(WAVE_PARAMS_UNIFORM, self.config.params.to_vec3());
        material.set_float(TIME_UNIFORM, 0.0);

        let clock = Arc::clone(&handle.clock);
        let target = Arc::clone(material);
        let subscription = scene.on_before_render().add(move |()| {
            let time = clock.lock().advance(engine.delta_time_ms());
            target.set_float(TIME_UNIFORM, time);
        });
        handle.start(subscription);

        tracing::info!(
            "Installed `{}` on material `{}`",
            self.config.effect_name,
            material.name()
        );
        Ok(())
    }

    /// Carry the original inputs forward and add the wave's uniforms
    fn descriptor(&self, effect: &dyn Effect, vertex: String, fragment: String) -> EffectDescriptor {
        let mut uniforms = effect.uniform_names();
        uniforms.extend(self.patch.uniform_names().map(str::to_string));

        let mut samplers = effect.sampler_names();
        samplers.extend(self.patch.sampler_names().map(str::to_string));

        EffectDescriptor {
            name: self.config.effect_name.clone(),
            vertex_source: vertex,
            fragment_source: fragment,
            attributes: effect.attribute_names(),
            uniforms,
            samplers,
            defines: effect.defines(),
        }
    }
}

/// Apply the wave with the default configuration
pub fn apply_splat_wave(mesh: &dyn Renderable, scene: &Arc<dyn Scene>) -> Result<WaveHandle> {
    SplatWave::default().apply(mesh, scene)
}
