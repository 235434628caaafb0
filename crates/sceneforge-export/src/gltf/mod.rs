//! glTF 2.0 exporter
//!
//! Document types mirror the glTF 2.0 JSON schema for the fields this
//! exporter produces. Cross-references between the arrays are plain
//! indices assigned monotonically as entities are appended; nothing is
//! ever renumbered.

mod animation;
mod buffer;
mod exporter;
mod geom;
pub mod glb;
mod skin;
mod vertex;

pub use animation::{AnimationSampler, SpeedScale};
pub use buffer::{ComponentType, ElementType, ExportedBuffer, GltfBuffer};
pub use exporter::{
    ExportType, GltfExportError, GltfExportOptions, GltfExporter, GltfOutput, GltfResult,
};
pub use geom::GeometryAssembler;
pub use skin::SkinBuilder;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// glTF 2.0 root structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gltf {
    pub asset: Asset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scenes: Vec<Scene>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nodes: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub meshes: Vec<Mesh>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub animations: Vec<Animation>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skins: Vec<Skin>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub accessors: Vec<Accessor>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        default,
        rename = "bufferViews"
    )]
    pub buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub buffers: Vec<Buffer>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        default,
        rename = "extensionsUsed"
    )]
    pub extensions_used: Vec<String>,
}

impl Gltf {
    /// Append a node, linking it as a child of `parent` or as a scene
    /// root when `parent` is `None`. Returns the new node's index.
    pub fn add_node(&mut self, node: Node, parent: Option<usize>) -> usize {
        self.nodes.push(node);
        let node_id = self.nodes.len() - 1;
        match parent {
            Some(parent_id) => self.nodes[parent_id].children.push(node_id),
            None => {
                if let Some(scene) = self.scenes.first_mut() {
                    scene.nodes.push(node_id);
                }
            }
        }
        node_id
    }

    /// Find a node index by name
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name.as_deref() == Some(name))
    }
}

/// glTF asset metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: None,
        }
    }
}

/// glTF scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<usize>,
}

/// glTF node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<NodeExtensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<BTreeMap<String, String>>,
}

impl Node {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Extension blocks this exporter can attach to a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExtensions {
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "BLENDER_physics"
    )]
    pub physics: Option<PhysicsCollision>,
}

/// Physics-collision descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsCollision {
    #[serde(rename = "collisionShapes")]
    pub collision_shapes: Vec<PhysicsShape>,
    #[serde(rename = "static")]
    pub is_static: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub intangible: bool,
}

/// One collision shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsShape {
    #[serde(rename = "shapeType")]
    pub shape_type: String,
    #[serde(rename = "boundingBox")]
    pub bounding_box: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
}

/// glTF mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub primitives: Vec<Primitive>,
}

/// glTF mesh primitive: one drawable sub-mesh with a single material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, usize>,
    pub indices: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    /// Highest emitted vertex index; assembly bookkeeping, not part of
    /// the document
    #[serde(skip, default = "default_highest_index")]
    pub highest_index: i64,
}

fn default_highest_index() -> i64 {
    -1
}

/// glTF material (name-level only; graph introspection is out of scope)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// glTF skin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub joints: Vec<usize>,
    #[serde(rename = "inverseBindMatrices")]
    pub inverse_bind_matrices: usize,
}

/// glTF animation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSamplerDef>,
}

/// Binds a sampler to a node property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub sampler: usize,
    pub target: AnimationTarget,
}

/// Target of an animation channel. `node` stays empty when the joint
/// has no node in the document; the sampler data is still written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<usize>,
    pub path: String,
}

/// Pairs a time-input accessor with an output accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSamplerDef {
    pub interpolation: String,
    pub input: usize,
    pub output: usize,
}

/// glTF accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessor {
    #[serde(rename = "bufferView")]
    pub buffer_view: usize,
    #[serde(rename = "componentType")]
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: String,
}

/// glTF buffer view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferView {
    pub buffer: usize,
    #[serde(rename = "byteOffset")]
    pub byte_offset: usize,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
}

/// glTF buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
}

// glTF component type constants
pub const COMPONENT_TYPE_UNSIGNED_BYTE: u32 = 5121;
pub const COMPONENT_TYPE_UNSIGNED_SHORT: u32 = 5123;
pub const COMPONENT_TYPE_FLOAT: u32 = 5126;
