//! Viewer data structures: the typed scene, per-primitive vertex wiring,
//! material resolution, proxy geometry and GPU textures.
//!
//! - `document` holds the index-based scene description and its traversal
//! - `transform` holds node transforms
//! - `vertex_array` computes vertex/index bindings and VAO ranges
//! - `material` decides texture sources and factors per primitive
//! - `geometry` provides the unit cube and the full-screen quad
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod document;
pub mod geometry;
pub mod material;
pub mod texture;
pub mod transform;
pub mod vertex_array;
