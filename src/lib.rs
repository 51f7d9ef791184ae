//! mdl-viewer
//!
//! Fetches a monster model from a model server (or a directory laid out the
//! same way) and shows it with wgpu. Loading chains three kinds of request:
//! the model document, each mesh's material document and every texture the
//! material lists. The loosely typed JSON attribute arrays are flattened into
//! typed vertex buffers on the way.
//!
//! High-level modules
//! - `camera`: orbit camera, projection and camera uniform
//! - `config`: viewer configuration from file, arguments or page URL
//! - `context`: GPU and window context that owns device, queue and pipeline
//! - `data_structures`: geometry, GPU models, textures and the scene
//! - `flow`: the winit application and its event loop
//! - `pipelines`: the render pipeline and its shader
//! - `resources`: documents, attribute flattening, texture decoding and fetching
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod resources;

pub use config::ViewerConfig;
pub use resources::{ModelData, fetch_model, paths::ModelSelection, source::AssetSource};
