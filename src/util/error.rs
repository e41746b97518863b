//! Error types for the deferred renderer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for renderer and asset operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Render target requested with a zero width or height
    #[error("Render target extent must be non-zero, got {width}x{height}")]
    ZeroExtent { width: u32, height: u32 },

    /// Render target larger than the device allows
    #[error("Render target {width}x{height} exceeds device limit {max}")]
    ExtentTooLarge { width: u32, height: u32, max: u32 },

    /// Attachment format cannot be used as a render attachment on this device
    #[error("Attachment `{name}` format {format:?} is not renderable on this device")]
    AttachmentNotRenderable { name: &'static str, format: wgpu::TextureFormat },

    /// Attachment table disagrees with the geometry program's declared outputs
    #[error("G-buffer attachment mismatch: {0}")]
    AttachmentMismatch(String),

    /// GPU validation rejected the render target set
    #[error("Render target `{target}` is incomplete: {reason}")]
    IncompleteTarget { target: &'static str, reason: String },

    /// WGSL failed to parse
    #[error("Shader `{name}` failed to parse: {message}")]
    ShaderParse { name: String, message: String },

    /// WGSL parsed but failed validation
    #[error("Shader `{name}` failed validation: {message}")]
    ShaderValidation { name: String, message: String },

    /// Pipeline creation rejected by the device
    #[error("Pipeline `{name}` creation failed: {message}")]
    PipelineCreation { name: String, message: String },

    /// Image file could not be decoded
    #[error("Failed to decode texture {path}: {message}")]
    TextureDecode { path: PathBuf, message: String },

    /// Model file could not be imported
    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    /// Model file extension not handled by any importer
    #[error("Unsupported model format: {0}")]
    UnsupportedModel(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a model load error.
    pub fn model(path: impl Into<PathBuf>, msg: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: msg.to_string(),
        }
    }
}

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::ZeroExtent { width: 0, height: 720 };
        assert!(e.to_string().contains("0x720"));

        let e = Error::AttachmentNotRenderable {
            name: "position",
            format: wgpu::TextureFormat::Rgba16Float,
        };
        assert!(e.to_string().contains("position"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_model_helper() {
        let e = Error::model("scene.gltf", "bad accessor");
        assert!(matches!(e, Error::ModelLoad { .. }));
        assert!(e.to_string().contains("scene.gltf"));
    }
}
