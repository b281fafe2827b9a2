//! Splatwave CLI - Patch splat vertex shaders and preview the wave headlessly

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use splatwave_core::applier::{SplatWave, WaveStatus};
use splatwave_core::config::WaveConfig;
use splatwave_core::headless::{
    HeadlessEngine, HeadlessMaterial, HeadlessMesh, HeadlessScene, splat_effect,
};
use splatwave_core::host::Scene;
use splatwave_core::noise::{NoiseTextureConfig, save_png};
use splatwave_core::wave::TIME_UNIFORM;
use splatwave_shader::count_anchor;

#[derive(Parser)]
#[command(name = "splatwave")]
#[command(about = "Noise-driven wave displacement for Gaussian splat shaders", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the wave-patched version of a vertex shader
    Patch {
        /// Vertex shader source
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON config (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Report whether a vertex shader can take the wave patch
    Check {
        /// Vertex shader source
        #[arg(short, long)]
        input: PathBuf,

        /// JSON config (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate the noise texture sampled by the wave
    Noise {
        /// Output image file (.png)
        #[arg(short, long, default_value = "perlin.png")]
        output: PathBuf,

        /// Image width and height
        #[arg(long, default_value = "256")]
        size: u32,

        /// Base noise frequency
        #[arg(long, default_value = "4.0")]
        scale: f32,

        /// fBm octaves
        #[arg(long, default_value = "4")]
        octaves: u32,

        /// Noise seed
        #[arg(long, default_value = "0")]
        seed: u32,
    },

    /// Write the default config as JSON
    Config {
        /// Output file
        #[arg(short, long, default_value = "splatwave.json")]
        output: PathBuf,
    },

    /// Apply the wave on the headless host and step the render loop
    Simulate {
        /// Vertex shader to use instead of the bundled splat shader
        #[arg(long)]
        vertex: Option<PathBuf>,

        /// Number of frames to render
        #[arg(short, long, default_value = "10")]
        frames: u32,

        /// Frame delta in milliseconds
        #[arg(long, default_value = "16.667")]
        delta_ms: f32,

        /// Deliver the compiled effect only after the wave is requested
        #[arg(long)]
        deferred: bool,

        /// JSON config (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Patch {
            input,
            output,
            config,
        } => {
            run_patch(&input, &output, config.as_deref())?;
        }
        Commands::Check { input, config } => {
            run_check(&input, config.as_deref())?;
        }
        Commands::Noise {
            output,
            size,
            scale,
            octaves,
            seed,
        } => {
            let config = NoiseTextureConfig {
                size,
                scale,
                octaves,
                seed,
            };
            save_png(&config, &output)?;
            println!("Saved to: {}", output.display());
        }
        Commands::Config { output } => {
            WaveConfig::default().save(&output)?;
            println!("Saved to: {}", output.display());
        }
        Commands::Simulate {
            vertex,
            frames,
            delta_ms,
            deferred,
            config,
        } => {
            run_simulate(vertex.as_deref(), frames, delta_ms, deferred, config.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<WaveConfig> {
    match path {
        Some(path) => WaveConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(WaveConfig::default()),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run_patch(input: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let wave = SplatWave::new(load_config(config)?);
    let source = read_source(input)?;

    let patched = wave.patch().apply(&source)?;
    fs::write(output, patched)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Patched {} -> {}", input.display(), output.display());
    Ok(())
}

fn run_check(input: &Path, config: Option<&Path>) -> Result<()> {
    let wave = SplatWave::new(load_config(config)?);
    let patch = wave.patch();
    let source = read_source(input)?;

    let anchors = count_anchor(&source, patch.anchor());
    let applied = patch.is_applied(&source);

    println!("Anchor:      {}", patch.anchor());
    println!("Occurrences: {}", anchors);
    println!("Patched:     {}", if applied { "yes" } else { "no" });

    if applied {
        println!("OK - wave already present");
        return Ok(());
    }
    if anchors != 1 {
        bail!(
            "{} cannot be patched: anchor must occur exactly once, found {}",
            input.display(),
            anchors
        );
    }
    println!("OK - ready to patch");
    Ok(())
}

fn run_simulate(
    vertex: Option<&Path>,
    frames: u32,
    delta_ms: f32,
    deferred: bool,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let params = config.params;
    tracing::debug!("Simulating {} frames at {} ms (deferred: {})", frames, delta_ms, deferred);

    let mut effect = splat_effect();
    if let Some(path) = vertex {
        effect = effect.with_vertex_source(read_source(path)?);
    }

    let headless = Arc::new(HeadlessScene::new(Arc::new(HeadlessEngine::new())));
    let scene: Arc<dyn Scene> = headless.clone();
    let material = Arc::new(if deferred {
        HeadlessMaterial::new("splat")
    } else {
        HeadlessMaterial::with_effect("splat", Arc::new(effect.clone()))
    });
    let mesh = HeadlessMesh::new("splats").with_material(material.clone());

    let handle = SplatWave::new(config).apply(&mesh, &scene)?;
    if deferred {
        println!("Effect pending, finishing compilation...");
        material.finish_compilation(Arc::new(effect));
    }

    match handle.status() {
        WaveStatus::Applied => println!("Wave applied"),
        WaveStatus::Failed(reason) => bail!("Wave failed: {}", reason),
        other => {
            println!("Wave not applied: {:?}", other);
            return Ok(());
        }
    }

    for frame in 1..=frames {
        headless.render_frame(delta_ms);
        let time = material.float(TIME_UNIFORM).unwrap_or_default();
        println!(
            "frame {:>4}  uTime = {:>8.4}s  lift(noise=0.5) = {:+.4}",
            frame,
            time,
            params.offset_at(0.5, time)
        );
    }

    handle.stop();
    Ok(())
}
