//! Startup errors.
//!
//! Everything in here is fatal: the viewer cannot draw a correct frame without
//! the scene, the shader programs or the GPU features it asks for. Degraded
//! situations (missing environment image, missing attributes or textures) are
//! never reported through this type, they fall back and log instead.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to load scene {path}")]
    SceneLoad {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("failed to read environment image {path}")]
    EnvironmentLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("could not read shader source {path}")]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader program `{program}` failed to compile:\n{message}")]
    ShaderCompile { program: String, message: String },

    #[error("could not create a window surface")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no GPU adapter available: {0}")]
    NoAdapter(String),

    #[error("required GPU capability missing: {0}")]
    MissingCapability(String),

    #[error("resource error: {0}")]
    Resource(String),
}
