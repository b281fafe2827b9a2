//! Error types for splatwave

use splatwave_shader::PatchError;
use thiserror::Error;

use crate::host::CompileError;

/// Result type alias using splatwave's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while applying the wave effect
#[derive(Error, Debug)]
pub enum Error {
    /// The renderable has no shader material to patch
    #[error("Cannot apply wave effect: mesh `{0}` has no material")]
    MissingMaterial(String),

    /// The vertex source could not be patched
    #[error("Shader patch failed: {0}")]
    Patch(#[from] PatchError),

    /// The host rejected the patched effect
    #[error("Error compiling wave shader: {0}")]
    Compile(#[from] CompileError),

    /// The noise texture could not be loaded
    #[error("Failed to load texture `{path}`: {reason}")]
    TextureLoad { path: String, reason: String },

    /// Configuration values are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Config (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
