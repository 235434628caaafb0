//! Sceneforge scene model
//!
//! The in-memory representation of a source scene as authored in a DCC
//! tool: an object hierarchy with meshes, armatures, lights, collision
//! bodies, and keyframed actions. Exporters walk this model; it is the
//! only thing they know about the authoring side.
//!
//! Documents are plain serde types and load from JSON, so scenes can be
//! produced by any tool that can dump its document in this shape.

pub mod animation;
pub mod armature;
pub mod mesh;
pub mod object;

pub use animation::{Action, BoneCurves, FrameGuard, FrameState, Keyframe};
pub use armature::{Armature, Bone};
pub use mesh::{MeshData, MeshVertex, Polygon, UvLayer, VertexWeight};
pub use object::{
    CollisionShape, Light, LightKind, ObjectKind, RigidBody, SceneDocument, SceneObject,
};
