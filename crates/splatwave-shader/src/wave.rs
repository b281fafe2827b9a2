//! The built-in noise-driven wave displacement patch
//!
//! Each splat center is lifted along Y by
//! `sin(noise(center.xz * frequency) * TAU + time * speed) * amplitude`,
//! where the noise comes from the red channel of a 2D texture.

use crate::{StatementBlock, UniformDecl, UniformKind, VertexPatch};

/// Statement in generated Gaussian splatting vertex shaders that reads a splat center
pub const WAVE_ANCHOR: &str = "vec3 center = readCenter(splatIndex);";

/// Sampler holding the noise texture
pub const NOISE_TEXTURE_UNIFORM: &str = "uNoiseTexture";

/// Elapsed time in seconds
pub const TIME_UNIFORM: &str = "uTime";

/// x: amplitude, y: frequency, z: speed
pub const WAVE_PARAMS_UNIFORM: &str = "uWaveParams";

/// Name of the inserted statement block
pub const WAVE_BLOCK: &str = "splat_wave";

/// The three statements inserted after the anchor
pub fn wave_block() -> StatementBlock {
    StatementBlock::new(WAVE_BLOCK)
        .statement(format!(
            "float waveNoise = texture({tex}, center.xz * {params}.y).r;",
            tex = NOISE_TEXTURE_UNIFORM,
            params = WAVE_PARAMS_UNIFORM,
        ))
        .statement(format!(
            "float waveOffset = sin(waveNoise * 6.28318 + {time} * {params}.z) * {params}.x;",
            time = TIME_UNIFORM,
            params = WAVE_PARAMS_UNIFORM,
        ))
        .statement("center.y += waveOffset;")
}

/// Build the wave patch for a vertex stage whose anchor is `anchor`
pub fn wave_patch(anchor: &str) -> VertexPatch {
    VertexPatch::new(anchor, wave_block())
        .with_declaration(UniformDecl::new(
            NOISE_TEXTURE_UNIFORM,
            UniformKind::Sampler2D,
        ))
        .with_declaration(UniformDecl::new(TIME_UNIFORM, UniformKind::Float))
        .with_declaration(
            UniformDecl::new(WAVE_PARAMS_UNIFORM, UniformKind::Vec3)
                .with_comment("x: amplitude, y: frequency, z: speed"),
        )
}
