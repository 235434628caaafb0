//! Scene objects and the document that owns them
//!
//! Objects live in a flat list with parent indices; hierarchy queries
//! walk that list. Object kinds are a closed enum, so traversal code
//! matches on them exhaustively instead of string-typed dispatch.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sceneforge_core::{Error, Result};

use crate::animation::{Action, FrameState};
use crate::armature::Armature;
use crate::mesh::MeshData;

/// Collision shape kinds understood by the physics extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollisionShape {
    Box,
    Sphere,
    Capsule,
    Cylinder,
    Cone,
    ConvexHull,
    Mesh,
}

impl CollisionShape {
    /// Wire name used by the physics extension block
    pub fn as_str(&self) -> &'static str {
        match self {
            CollisionShape::Box => "BOX",
            CollisionShape::Sphere => "SPHERE",
            CollisionShape::Capsule => "CAPSULE",
            CollisionShape::Cylinder => "CYLINDER",
            CollisionShape::Cone => "CONE",
            CollisionShape::ConvexHull => "CONVEX_HULL",
            CollisionShape::Mesh => "MESH",
        }
    }
}

/// Rigid-body settings on a collision object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBody {
    pub collision_shape: CollisionShape,
    /// Passive bodies export as static colliders
    #[serde(default)]
    pub passive: bool,
    /// Ghost bodies report contacts but do not collide
    #[serde(default)]
    pub ghost: bool,
}

/// Light kinds the exporter understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightKind {
    Point,
    Spot,
}

/// Light data block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub energy: f32,
    /// Soft shadow radius; exported as the light's far distance
    #[serde(default)]
    pub shadow_soft_size: f32,
    /// Spot cone angle in radians
    #[serde(default)]
    pub spot_size: f32,
}

/// Closed set of object kinds with their data payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ObjectKind {
    Empty,
    Mesh(MeshData),
    Armature(Armature),
    Light(Light),
}

/// One object in the scene hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    /// Parent object index
    #[serde(default)]
    pub parent: Option<usize>,
    /// Transform relative to the parent object
    #[serde(default = "Mat4::default")]
    pub matrix_local: Mat4,
    /// Collection this object belongs to, used for merging
    #[serde(default)]
    pub collection: Option<String>,
    /// Name of the armature object deforming this object
    #[serde(default)]
    pub armature: Option<String>,
    /// Free-form custom properties; exported as node tags
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Hidden objects are skipped unless they are collision shapes
    #[serde(default)]
    pub hidden: bool,
    /// Present on collision objects
    #[serde(default)]
    pub rigid_body: Option<RigidBody>,
    #[serde(flatten)]
    pub kind: ObjectKind,
}

impl SceneObject {
    /// Whether this object is a collision shape
    pub fn is_collision(&self) -> bool {
        self.rigid_body.is_some()
    }

    /// Whether the object should appear in exports
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }

    /// The mesh payload, if this is a mesh object
    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// The armature payload, if this is an armature object
    pub fn armature_data(&self) -> Option<&Armature> {
        match &self.kind {
            ObjectKind::Armature(armature) => Some(armature),
            _ => None,
        }
    }

    /// String property lookup (`properties["type"]` etc.)
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

/// A complete source scene
#[derive(Debug, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub name: String,
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default = "default_frame_start")]
    pub frame_start: f32,
    #[serde(default = "default_frame_start")]
    pub frame_end: f32,
    /// Current-frame pointer; exclusive to one running conversion
    #[serde(skip)]
    pub frame_state: FrameState,
}

fn default_frame_start() -> f32 {
    1.0
}

impl SceneDocument {
    /// Load a scene document from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|_| Error::FileNotFound(path.to_path_buf()))?;
        let doc: SceneDocument = serde_json::from_str(&data)
            .map_err(|e| Error::invalid_data(format!("malformed scene JSON: {e}")))?;
        debug!(objects = doc.objects.len(), actions = doc.actions.len(), "loaded scene");
        doc.validate()?;
        Ok(doc)
    }

    /// Structural sanity checks on parent links and armatures
    pub fn validate(&self) -> Result<()> {
        for (idx, obj) in self.objects.iter().enumerate() {
            if let Some(parent) = obj.parent {
                if parent >= self.objects.len() || parent == idx {
                    return Err(Error::invalid_data(format!(
                        "object {} has invalid parent index {parent}",
                        obj.name
                    )));
                }
            }
            if let ObjectKind::Armature(armature) = &obj.kind {
                armature.validate().map_err(Error::invalid_data)?;
            }
        }
        Ok(())
    }

    /// Indices of root objects (no parent)
    pub fn root_objects(&self) -> impl Iterator<Item = usize> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.parent.is_none())
            .map(|(i, _)| i)
    }

    /// Indices of direct children of an object
    pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(move |(_, o)| o.parent == Some(index))
            .map(|(i, _)| i)
    }

    /// Find object index by name
    pub fn find_object(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name == name)
    }

    /// Find an action by name
    pub fn find_action(&self, name: &str) -> Result<&Action> {
        self.actions
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::ActionNotFound { name: name.to_string() })
    }

    /// Index of the armature object deforming this object, if any.
    ///
    /// Only the explicit `armature` binding counts; being parented under
    /// an armature object does not deform a mesh by itself.
    pub fn armature_of(&self, index: usize) -> Option<usize> {
        self.objects[index]
            .armature
            .as_deref()
            .and_then(|name| self.find_object(name))
    }

    /// World matrix of an object (parent chain applied)
    pub fn matrix_world(&self, index: usize) -> Mat4 {
        let obj = &self.objects[index];
        match obj.parent {
            Some(parent) => self.matrix_world(parent) * obj.matrix_local,
            None => obj.matrix_local,
        }
    }

    /// Object matrix as the exporters consume it.
    ///
    /// Without a deforming armature the local matrix is returned
    /// unchanged. With one, parented objects yield their parent-relative
    /// matrix and unparented objects are lifted into world space through
    /// the armature.
    pub fn object_matrix(&self, index: usize, armature: Option<usize>) -> Mat4 {
        let obj = &self.objects[index];
        match armature {
            None => obj.matrix_local,
            Some(armature_idx) => match obj.parent {
                Some(parent) => {
                    self.objects[parent].matrix_local.inverse() * obj.matrix_local
                }
                None => self.matrix_world(armature_idx) * obj.matrix_local,
            },
        }
    }
}
