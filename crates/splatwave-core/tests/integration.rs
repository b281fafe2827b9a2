//! Integration tests for applying the wave on the headless host

// Tests are allowed to use expect/unwrap for cleaner error messages
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use approx::assert_relative_eq;
use splatwave_core::Error;
use splatwave_core::applier::{SplatWave, WaveStatus, apply_splat_wave};
use splatwave_core::config::WaveConfig;
use splatwave_core::headless::{
    HeadlessEffect, HeadlessEngine, HeadlessMaterial, HeadlessMesh, HeadlessScene,
    SPLAT_VERTEX_SHADER, splat_effect,
};
use splatwave_core::host::{Effect, Material, Scene};
use splatwave_core::noise::{NoiseTextureConfig, save_png};
use splatwave_core::prelude::Vec3;
use splatwave_core::wave::{NOISE_TEXTURE_UNIFORM, TIME_UNIFORM, WAVE_PARAMS_UNIFORM};
use splatwave_shader::wave::{WAVE_ANCHOR, wave_block};

struct Rig {
    headless: Arc<HeadlessScene>,
    scene: Arc<dyn Scene>,
    material: Arc<HeadlessMaterial>,
    mesh: HeadlessMesh,
}

impl Rig {
    fn compiled(effect: HeadlessEffect) -> Self {
        Self::with_material(HeadlessMaterial::with_effect("splat", Arc::new(effect)))
    }

    fn pending() -> Self {
        Self::with_material(HeadlessMaterial::new("splat"))
    }

    fn with_material(material: HeadlessMaterial) -> Self {
        let headless = Arc::new(HeadlessScene::new(Arc::new(HeadlessEngine::new())));
        let scene: Arc<dyn Scene> = headless.clone();
        let material = Arc::new(material);
        let mesh = HeadlessMesh::new("splats").with_material(material.clone());
        Self {
            headless,
            scene,
            material,
            mesh,
        }
    }

    fn vertex_source(&self) -> String {
        self.material
            .effect()
            .and_then(|e| e.vertex_source())
            .expect("material should have a vertex source")
    }

    fn compilations(&self) -> usize {
        self.headless.headless_engine().compilations()
    }
}

#[test]
fn applying_twice_matches_applying_once() {
    let rig = Rig::compiled(splat_effect());

    let first = apply_splat_wave(&rig.mesh, &rig.scene).expect("first apply");
    assert_eq!(first.status(), WaveStatus::Applied);
    let once = rig.vertex_source();

    let second = apply_splat_wave(&rig.mesh, &rig.scene).expect("second apply");
    assert_eq!(second.status(), WaveStatus::AlreadyPatched);
    assert!(!second.is_running());

    assert_eq!(rig.vertex_source(), once);
    assert_eq!(rig.compilations(), 1);
    assert_eq!(rig.material.effect_installs(), 1);
    assert_eq!(rig.scene.on_before_render().observer_count(), 1);
}

#[test]
fn patched_source_has_declarations_then_statements_after_anchor() {
    let rig = Rig::compiled(splat_effect());
    apply_splat_wave(&rig.mesh, &rig.scene).unwrap();

    let source = rig.vertex_source();
    let lines: Vec<&str> = source.lines().collect();
    assert_eq!(lines[0], "uniform sampler2D uNoiseTexture;");
    assert_eq!(lines[1], "uniform float uTime;");
    assert!(lines[2].starts_with("uniform vec3 uWaveParams;"));
    assert_eq!(source.matches(NOISE_TEXTURE_UNIFORM).count(), 2);

    let anchor_at = lines
        .iter()
        .position(|l| l.trim() == WAVE_ANCHOR)
        .expect("anchor kept");
    for (i, statement) in wave_block().statements.iter().enumerate() {
        assert_eq!(lines[anchor_at + 1 + i].trim(), statement);
    }

    let body: String = SPLAT_VERTEX_SHADER.lines().collect::<Vec<_>>().join("\n");
    let mut without_patch: Vec<&str> = lines[3..].to_vec();
    without_patch.drain(anchor_at - 2..anchor_at + 1);
    assert_eq!(without_patch.join("\n"), body);
}

#[test]
fn deferred_path_applies_exactly_once_on_first_effect() {
    let rig = Rig::pending();
    let handle = apply_splat_wave(&rig.mesh, &rig.scene).unwrap();

    assert_eq!(handle.status(), WaveStatus::Pending);
    assert_eq!(rig.compilations(), 0);
    assert!(!rig.scene.on_before_render().has_observers());

    rig.material.finish_compilation(Arc::new(splat_effect()));
    assert_eq!(handle.status(), WaveStatus::Applied);
    assert_eq!(rig.compilations(), 1);
    assert_eq!(rig.material.effect_installs(), 1);

    rig.material.finish_compilation(Arc::new(splat_effect()));
    assert_eq!(rig.compilations(), 1);
    assert_eq!(rig.material.effect_installs(), 1);
    assert_eq!(rig.scene.on_before_render().observer_count(), 1);
}

#[test]
fn deferred_path_never_fires_without_effect() {
    let rig = Rig::pending();
    let handle = apply_splat_wave(&rig.mesh, &rig.scene).unwrap();

    for _ in 0..10 {
        rig.headless.render_frame(16.0);
    }

    assert_eq!(handle.status(), WaveStatus::Pending);
    assert_eq!(rig.compilations(), 0);
    assert!(rig.material.float(TIME_UNIFORM).is_none());
    assert!(rig.material.on_effect_created().has_observers());
}

#[test]
fn missing_material_compiles_and_registers_nothing() {
    let headless = Arc::new(HeadlessScene::new(Arc::new(HeadlessEngine::new())));
    let scene: Arc<dyn Scene> = headless.clone();
    let mesh = HeadlessMesh::new("bare");

    let result = apply_splat_wave(&mesh, &scene);
    assert!(matches!(result, Err(Error::MissingMaterial(ref name)) if name == "bare"));
    assert_eq!(headless.headless_engine().compilations(), 0);
    assert!(!scene.on_before_render().has_observers());
}

#[test]
fn uniforms_are_initialized_after_apply() {
    let rig = Rig::compiled(splat_effect());
    apply_splat_wave(&rig.mesh, &rig.scene).unwrap();

    let texture = rig
        .material
        .texture(NOISE_TEXTURE_UNIFORM)
        .expect("noise texture bound");
    assert_eq!(texture.path, "/img/perlin.png");
    assert_eq!(
        rig.material.vector3(WAVE_PARAMS_UNIFORM),
        Some(Vec3::new(0.1, 1.5, 0.5))
    );
    assert_eq!(rig.material.float(TIME_UNIFORM), Some(0.0));

    let effect = rig.material.effect().unwrap();
    assert_eq!(effect.name(), "splatWaveEffect");
    assert!(effect.uniform_names().iter().any(|u| u == TIME_UNIFORM));
    assert!(effect.uniform_names().iter().any(|u| u == WAVE_PARAMS_UNIFORM));
    assert!(effect.sampler_names().iter().any(|s| s == NOISE_TEXTURE_UNIFORM));
}

#[test]
fn time_uniform_is_sum_of_deltas_in_seconds() {
    let rig = Rig::compiled(splat_effect());
    let handle = apply_splat_wave(&rig.mesh, &rig.scene).unwrap();

    let deltas = [16.7_f32, 16.6, 33.4, 8.0, 0.0, 120.25, 16.7];
    let mut previous = 0.0;
    for delta in deltas {
        rig.headless.render_frame(delta);
        let time = rig.material.float(TIME_UNIFORM).unwrap();
        assert!(time >= previous);
        previous = time;
    }

    let expected: f32 = deltas.iter().sum::<f32>() / 1000.0;
    assert_relative_eq!(rig.material.float(TIME_UNIFORM).unwrap(), expected, epsilon = 1e-5);
    assert_relative_eq!(handle.elapsed_seconds(), expected, epsilon = 1e-5);
}

#[test]
fn compile_failure_keeps_previous_effect() {
    // A stray closing brace in the fragment stage makes the recompile fail
    let mut descriptor = splatwave_core::headless::splat_descriptor();
    descriptor.fragment_source.push_str("\n}\n");
    let broken = HeadlessEffect::from_descriptor(descriptor);
    let rig = Rig::compiled(broken);

    let result = apply_splat_wave(&rig.mesh, &rig.scene);
    assert!(matches!(result, Err(Error::Compile(_))));
    assert_eq!(rig.compilations(), 1);
    assert_eq!(rig.material.effect_installs(), 0);
    assert_eq!(rig.material.effect().unwrap().name(), "gaussianSplatting");
    assert!(rig.material.float(TIME_UNIFORM).is_none());
    assert!(!rig.scene.on_before_render().has_observers());
}

#[test]
fn deferred_compile_failure_is_reported_on_the_handle() {
    let rig = Rig::pending();
    let handle = apply_splat_wave(&rig.mesh, &rig.scene).unwrap();

    let mut descriptor = splatwave_core::headless::splat_descriptor();
    descriptor.fragment_source.push_str("\n}\n");
    rig.material
        .finish_compilation(Arc::new(HeadlessEffect::from_descriptor(descriptor)));

    assert!(matches!(handle.status(), WaveStatus::Failed(_)));
    assert_eq!(rig.material.effect_installs(), 0);
    assert!(!rig.scene.on_before_render().has_observers());
}

#[test]
fn missing_anchor_is_an_error_not_a_silent_recompile() {
    let effect = splat_effect().with_vertex_source("void main() { gl_Position = vec4(0.0); }");
    let rig = Rig::compiled(effect);

    let result = apply_splat_wave(&rig.mesh, &rig.scene);
    assert!(matches!(result, Err(Error::Patch(_))));
    assert_eq!(rig.compilations(), 0);
    assert_eq!(rig.material.effect_installs(), 0);
}

#[test]
fn sources_unavailable_is_a_silent_no_op() {
    let rig = Rig::compiled(splat_effect().without_source());

    let handle = apply_splat_wave(&rig.mesh, &rig.scene).unwrap();
    assert_eq!(handle.status(), WaveStatus::SourceUnavailable);
    assert_eq!(rig.compilations(), 0);
    assert!(rig.material.float(TIME_UNIFORM).is_none());
}

#[test]
fn stopping_ends_time_updates() {
    let rig = Rig::compiled(splat_effect());
    let handle = apply_splat_wave(&rig.mesh, &rig.scene).unwrap();

    rig.headless.render_frame(250.0);
    handle.stop();
    rig.headless.render_frame(250.0);
    rig.headless.render_frame(250.0);

    assert_eq!(handle.status(), WaveStatus::Stopped);
    assert_relative_eq!(rig.material.float(TIME_UNIFORM).unwrap(), 0.25, epsilon = 1e-6);
    assert!(!rig.scene.on_before_render().has_observers());
}

#[test]
fn dropping_the_handle_keeps_the_wave_running() {
    let rig = Rig::compiled(splat_effect());
    drop(apply_splat_wave(&rig.mesh, &rig.scene).unwrap());

    rig.headless.render_frame(100.0);
    rig.headless.render_frame(150.0);

    assert_relative_eq!(rig.material.float(TIME_UNIFORM).unwrap(), 0.25, epsilon = 1e-6);
    assert_eq!(rig.scene.on_before_render().observer_count(), 1);
}

#[test]
fn deferred_effect_after_scene_dropped_fails_without_installing() {
    let engine = Arc::new(HeadlessEngine::new());
    let scene: Arc<dyn Scene> = Arc::new(HeadlessScene::new(engine.clone()));
    let material = Arc::new(HeadlessMaterial::new("splat"));
    let mesh = HeadlessMesh::new("splats").with_material(material.clone());

    let handle = apply_splat_wave(&mesh, &scene).unwrap();
    assert_eq!(handle.status(), WaveStatus::Pending);
    drop(scene);

    material.finish_compilation(Arc::new(splat_effect()));

    assert!(matches!(handle.status(), WaveStatus::Failed(_)));
    assert!(!handle.is_running());
    assert_eq!(engine.compilations(), 0);
    assert_eq!(material.effect_installs(), 0);
    assert!(material.float(TIME_UNIFORM).is_none());
    assert!(!material.on_effect_created().has_observers());
}

#[test]
fn invalid_config_is_rejected_before_touching_the_material() {
    let rig = Rig::compiled(splat_effect());
    let mut config = WaveConfig::default();
    config.params.amplitude = f32::NAN;

    let result = SplatWave::new(config).apply(&rig.mesh, &rig.scene);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert_eq!(rig.compilations(), 0);
    assert_eq!(rig.material.effect_installs(), 0);
    assert!(rig.material.vector3(WAVE_PARAMS_UNIFORM).is_none());
}

#[test]
fn custom_config_drives_uniforms_and_texture_path() {
    let config = WaveConfig::from_json(
        r#"{ "noise_texture": "textures/noise.png", "params": { "amplitude": 0.4, "frequency": 2.0, "speed": 1.0 }, "effect_name": "customWave" }"#,
    )
    .unwrap();
    let rig = Rig::compiled(splat_effect());

    SplatWave::new(config).apply(&rig.mesh, &rig.scene).unwrap();

    assert_eq!(
        rig.material.vector3(WAVE_PARAMS_UNIFORM),
        Some(Vec3::new(0.4, 2.0, 1.0))
    );
    assert_eq!(
        rig.material.texture(NOISE_TEXTURE_UNIFORM).unwrap().path,
        "textures/noise.png"
    );
    assert_eq!(rig.material.effect().unwrap().name(), "customWave");
}

#[test]
fn missing_noise_asset_keeps_previous_effect() {
    let root = std::env::temp_dir().join("splatwave_it_missing_assets");
    let engine = Arc::new(HeadlessEngine::new());
    let headless = Arc::new(HeadlessScene::new(engine).with_asset_root(&root));
    let scene: Arc<dyn Scene> = headless.clone();
    let material = Arc::new(HeadlessMaterial::with_effect("splat", Arc::new(splat_effect())));
    let mesh = HeadlessMesh::new("splats").with_material(material.clone());

    let result = apply_splat_wave(&mesh, &scene);
    assert!(matches!(result, Err(Error::TextureLoad { .. })));
    assert_eq!(material.effect_installs(), 0);
    assert_eq!(material.effect().unwrap().name(), "gaussianSplatting");
}

#[test]
fn generated_noise_asset_is_bound_with_its_size() {
    let root = std::env::temp_dir().join("splatwave_it_assets");
    let noise = NoiseTextureConfig {
        size: 64,
        ..NoiseTextureConfig::default()
    };
    std::fs::create_dir_all(root.join("img")).unwrap();
    save_png(&noise, root.join("img/perlin.png")).unwrap();

    let engine = Arc::new(HeadlessEngine::new());
    let headless = Arc::new(HeadlessScene::new(engine).with_asset_root(&root));
    let scene: Arc<dyn Scene> = headless.clone();
    let material = Arc::new(HeadlessMaterial::with_effect("splat", Arc::new(splat_effect())));
    let mesh = HeadlessMesh::new("splats").with_material(material.clone());

    apply_splat_wave(&mesh, &scene).unwrap();
    let texture = material.texture(NOISE_TEXTURE_UNIFORM).unwrap();
    assert_eq!(texture.size, Some((64, 64)));

    std::fs::remove_dir_all(&root).ok();
}
