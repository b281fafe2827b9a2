//! Splatwave Shader - Host-agnostic vertex stage patching
//!
//! Shader sources generated by a host engine are treated as text with a
//! single named extension point: an anchor statement. Patches insert a named
//! statement block directly after that anchor and declare the uniforms the
//! block reads at the top of the stage.
//!
//! ## Key Types
//!
//! - [`VertexPatch`] - Anchor, marker, declarations and statement block
//! - [`StatementBlock`] - A named run of shader statements
//! - [`UniformDecl`] - A `uniform <type> <name>;` declaration
//! - [`PatchError`] - Why a source could not be patched
//!
//! ## Example
//!
//! ```rust
//! use splatwave_shader::wave::{WAVE_ANCHOR, wave_patch};
//!
//! let source = "void main() {\n    vec3 center = readCenter(splatIndex);\n}\n";
//! let patch = wave_patch(WAVE_ANCHOR);
//! let patched = patch.apply(source).unwrap();
//!
//! assert!(patched.starts_with("uniform sampler2D uNoiseTexture;"));
//! assert!(patch.is_applied(&patched));
//! ```

mod patch;
pub mod wave;

pub use patch::{
    AnchorSite, PatchError, StatementBlock, UniformDecl, UniformKind, VertexPatch, count_anchor,
    insert_after_anchor, line_ending, locate_anchor, prepend_declarations,
};
