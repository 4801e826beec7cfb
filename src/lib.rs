//! flow-viewer
//!
//! A glTF 2.0 viewer on wgpu. Scenes are drawn with physically based
//! materials and image based lighting computed from an equirectangular HDR
//! environment at startup. The viewer runs interactively in a window or
//! renders a single frame into an image file.
//!
//! High-level modules
//! - `camera`: camera, projection, input state and the two controllers
//! - `config`: command line arguments and the viewer configuration
//! - `context`: device setup with or without a window surface
//! - `data_structures`: typed scene, vertex wiring, materials, GPU textures
//! - `flow`: frame driver, interactive loop and single-shot capture
//! - `ibl`: irradiance, prefiltered environment and BRDF lookup table
//! - `pipelines`: render pipelines of the forward, skybox and capture passes
//! - `readback`: copying textures back to the CPU
//! - `render`: per-frame scene traversal and draw recording
//! - `resources`: file loading, shaders, mipmaps and the GPU scene
//! - `settings`: feature toggles, light and key bindings
//! - `viewer`: owner of all GPU resources of a loaded scene
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod ibl;
pub mod pipelines;
pub mod readback;
pub mod render;
pub mod resources;
pub mod settings;
pub mod viewer;

pub use error::ViewerError;
