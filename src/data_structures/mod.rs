//! Viewer data structures.
//!
//! - `geometry` holds a mesh's attributes as flat typed buffers
//! - `model` contains the vertex layout, GPU meshes, materials and draw helpers
//! - `texture` wraps GPU textures and their creation
//! - `scene` keeps the model on screen and tracks which load is current

pub mod geometry;
pub mod model;
pub mod scene;
pub mod texture;
