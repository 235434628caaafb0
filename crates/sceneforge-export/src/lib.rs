//! Sceneforge export pipeline
//!
//! Converts a [`sceneforge_scene::SceneDocument`] into glTF 2.0: the
//! JSON document tree plus one little-endian binary buffer, written
//! either as `.gltf` + sibling `.bin` or as a single `.glb` container.

pub mod gltf;
pub mod inspect;

pub use gltf::{GltfExportError, GltfExportOptions, GltfExporter, GltfOutput, GltfResult};
