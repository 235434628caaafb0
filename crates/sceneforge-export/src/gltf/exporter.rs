//! Scene-to-glTF conversion
//!
//! Walks the scene hierarchy depth-first and dispatches on the object
//! kind, building nodes, meshes, skins and animations against one
//! shared binary buffer. The buffer is finalized exactly once, after
//! the whole graph is assembled; output files are only written when
//! every serialization step has already succeeded.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

use sceneforge_core::Transform;
use sceneforge_scene::{
    Action, CollisionShape, LightKind, ObjectKind, SceneDocument, SceneObject,
};

use super::animation::{AnimationSampler, SpeedScale};
use super::buffer::GltfBuffer;
use super::geom::GeometryAssembler;
use super::glb;
use super::skin::SkinBuilder;
use super::{
    Asset, Buffer, Gltf, Material, Mesh, Node, NodeExtensions, PhysicsCollision,
    PhysicsShape, Scene,
};

/// Property types that always keep their own node under `--merge`
const NOT_MERGED_TYPES: &[&str] = &[
    "Portal",
    "Text",
    "Sprite",
    "Transparent",
    "Protected",
    "Dynamic",
];

const DEFAULT_MATERIAL: &str = "GLTF_DEFAULT_MATERIAL";

#[derive(Debug, Error)]
pub enum GltfExportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid glb container: {0}")]
    InvalidContainer(String),
    #[error("unknown export type {0:?}, expected all, animation or collision")]
    UnknownExportType(String),
    #[error(transparent)]
    Scene(#[from] sceneforge_core::Error),
}

pub type GltfResult<T> = Result<T, GltfExportError>;

/// What subset of the scene to export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportType {
    /// The full scene graph
    #[default]
    All,
    /// Only the first visible armature's baked action
    Animation,
    /// Only collision geometry
    Collision,
}

impl FromStr for ExportType {
    type Err = GltfExportError;

    fn from_str(s: &str) -> GltfResult<Self> {
        match s {
            "all" => Ok(ExportType::All),
            "animation" => Ok(ExportType::Animation),
            "collision" => Ok(ExportType::Collision),
            other => Err(GltfExportError::UnknownExportType(other.to_string())),
        }
    }
}

/// Conversion settings
#[derive(Debug)]
pub struct GltfExportOptions {
    pub export_type: ExportType,
    /// Action to bake for animation exports; defaults to the scene's
    /// first action
    pub action: Option<String>,
    /// Merge mesh objects sharing a collection into one node
    pub merge: bool,
    /// With `merge`, also keep the separate per-object nodes
    pub keep: bool,
    /// Uniform scale applied to positions and node translations
    pub geom_scale: f32,
    pub speed_scale: SpeedScale,
    /// Export non-active UV layers
    pub extra_uv: bool,
    /// Declare the document as Z-up via the `BP_zup` extension
    pub z_up: bool,
}

impl Default for GltfExportOptions {
    fn default() -> Self {
        Self {
            export_type: ExportType::All,
            action: None,
            merge: false,
            keep: false,
            geom_scale: 1.0,
            speed_scale: SpeedScale::default(),
            extra_uv: true,
            z_up: true,
        }
    }
}

/// Finished conversion: the document plus its binary blob
#[derive(Debug)]
pub struct GltfOutput {
    pub document: Gltf,
    pub blob: Vec<u8>,
}

impl GltfOutput {
    fn document_with_buffer(&self, uri: Option<String>) -> Gltf {
        let mut document = self.document.clone();
        document.buffers.push(Buffer {
            uri,
            byte_length: self.blob.len(),
        });
        document
    }

    /// Write `path` as JSON glTF with a sibling `.bin` buffer file
    pub fn write_gltf(&self, path: &Path) -> GltfResult<()> {
        let bin_path = path.with_extension("bin");
        let uri = bin_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "buffer.bin".to_string());

        let document = self.document_with_buffer(Some(uri));
        let json = serde_json::to_vec_pretty(&document)?;

        fs::write(&bin_path, &self.blob)?;
        fs::write(path, json)?;
        info!(path = %path.display(), bytes = self.blob.len(), "wrote gltf");
        Ok(())
    }

    /// The document packed as a GLB container
    pub fn glb_bytes(&self) -> GltfResult<Vec<u8>> {
        let document = self.document_with_buffer(None);
        let json = serde_json::to_vec(&document)?;

        let mut out = Vec::new();
        glb::write(&mut out, &json, &self.blob)?;
        Ok(out)
    }

    /// Write `path` as a single-file GLB container
    pub fn write_glb(&self, path: &Path) -> GltfResult<()> {
        let bytes = self.glb_bytes()?;
        fs::write(path, bytes)?;
        info!(path = %path.display(), bytes = self.blob.len(), "wrote glb");
        Ok(())
    }
}

/// Converts a scene document into a glTF document
pub struct GltfExporter {
    options: GltfExportOptions,
}

impl GltfExporter {
    pub fn new(options: GltfExportOptions) -> Self {
        Self { options }
    }

    /// Replace the speed scale with a per-frame function
    pub fn set_speed_fn(&mut self, f: impl Fn(i32) -> f32 + 'static) {
        self.options.speed_scale = SpeedScale::PerFrame(Box::new(f));
    }

    /// Run the conversion. The source document is left untouched; the
    /// frame pointer is restored even when animation baking runs.
    pub fn convert(&self, document: &SceneDocument) -> GltfResult<GltfOutput> {
        let mut root = self.make_root(document);
        let mut buffer = GltfBuffer::new();

        if self.options.export_type == ExportType::Animation {
            self.make_animation(&mut root, &mut buffer, document)?;
        } else {
            let roots: Vec<usize> = document.root_objects().collect();
            for index in roots {
                self.make_node(&mut root, &mut buffer, document, index, None)?;
            }
        }

        let exported = buffer.export();
        root.accessors = exported.accessors;
        root.buffer_views = exported.buffer_views;

        debug!(
            nodes = root.nodes.len(),
            meshes = root.meshes.len(),
            animations = root.animations.len(),
            "conversion finished"
        );
        Ok(GltfOutput {
            document: root,
            blob: exported.blob,
        })
    }

    fn make_root(&self, document: &SceneDocument) -> Gltf {
        let scene_name = if document.name.is_empty() {
            "Scene".to_string()
        } else {
            document.name.clone()
        };

        Gltf {
            asset: Asset {
                version: "2.0".to_string(),
                generator: Some("sceneforge scene exporter".to_string()),
            },
            scene: Some(0),
            scenes: vec![Scene {
                name: Some(scene_name),
                nodes: Vec::new(),
            }],
            materials: vec![Material {
                name: Some(DEFAULT_MATERIAL.to_string()),
            }],
            extensions_used: if self.options.z_up {
                vec!["BP_zup".to_string()]
            } else {
                Vec::new()
            },
            ..Gltf::default()
        }
    }

    fn can_merge(&self, object: &SceneObject) -> bool {
        if !self.options.merge || object.collection.is_none() || object.is_collision() {
            return false;
        }
        match object.property_str("type") {
            Some(kind) => !NOT_MERGED_TYPES.contains(&kind),
            None => true,
        }
    }

    /// Dispatch one object and recurse into its children
    fn make_node(
        &self,
        root: &mut Gltf,
        buffer: &mut GltfBuffer,
        document: &SceneDocument,
        index: usize,
        parent: Option<usize>,
    ) -> GltfResult<()> {
        let object = &document.objects[index];
        if !object.is_visible() && !object.is_collision() {
            return Ok(());
        }

        if self.options.export_type == ExportType::Collision {
            match &object.kind {
                ObjectKind::Armature(_) | ObjectKind::Light(_) => return Ok(()),
                ObjectKind::Mesh(_) if !object.is_collision() => return Ok(()),
                _ => {}
            }
        }

        let node_id = match &object.kind {
            ObjectKind::Empty => Some(self.make_empty(root, document, index, parent)),
            ObjectKind::Mesh(_) => {
                self.make_mesh(root, buffer, document, index, parent)?
            }
            ObjectKind::Armature(_) => {
                Some(self.make_armature(root, buffer, document, index, parent))
            }
            ObjectKind::Light(_) => Some(self.make_light(root, document, index, parent)),
        };

        let Some(node_id) = node_id else {
            return Ok(());
        };

        let children: Vec<usize> = document.children_of(index).collect();
        for child in children {
            self.make_node(root, buffer, document, child, Some(node_id))?;
        }
        Ok(())
    }

    /// Fill in TRS, the collision extension and property tags
    fn setup_node(
        &self,
        node: &mut Node,
        document: &SceneDocument,
        index: usize,
        can_merge: bool,
    ) {
        let object = &document.objects[index];
        let armature = document.armature_of(index);
        let object_matrix = document.object_matrix(index, armature);

        // merged nodes bake the transform into vertices; skinned nodes
        // follow their joints
        if !can_merge && armature.is_none() {
            let transform = Transform::from_matrix(&object_matrix);
            node.rotation = Some(sceneforge_core::quat_to_array(transform.rotation));
            node.scale = Some(transform.scale.to_array());
            node.translation =
                Some((transform.translation * self.options.geom_scale).to_array());
        }

        let is_portal = object.property_str("type") == Some("Portal");
        if !can_merge && !is_portal {
            if let Some(rigid_body) = &object.rigid_body {
                let mut shape = PhysicsShape {
                    shape_type: rigid_body.collision_shape.as_str().to_string(),
                    bounding_box: object
                        .mesh()
                        .map(|data| data.bounding_box().size().to_array())
                        .unwrap_or([0.0; 3]),
                    mesh: None,
                };
                // mesh shapes reference the geometry from the shape,
                // not the node
                if rigid_body.collision_shape == CollisionShape::Mesh {
                    shape.mesh = node.mesh.take();
                }

                node.extensions = Some(NodeExtensions {
                    physics: Some(PhysicsCollision {
                        collision_shapes: vec![shape],
                        is_static: rigid_body.passive,
                        intangible: rigid_body.ghost,
                    }),
                });
            }
        }

        if !object.properties.is_empty() || can_merge {
            let extras = node.extras.get_or_insert_with(Default::default);
            for (key, value) in &object.properties {
                let tag = match value.as_str() {
                    Some(s) => s.to_string(),
                    None => value.to_string(),
                };
                extras.insert(key.clone(), tag);
            }
            if can_merge && !object.properties.contains_key("type") {
                extras.insert("type".to_string(), "Merged".to_string());
            }
        }
    }

    fn make_empty(
        &self,
        root: &mut Gltf,
        document: &SceneDocument,
        index: usize,
        parent: Option<usize>,
    ) -> usize {
        let mut node = Node::named(&document.objects[index].name);
        self.setup_node(&mut node, document, index, false);
        root.add_node(node, parent)
    }

    fn make_armature(
        &self,
        root: &mut Gltf,
        buffer: &mut GltfBuffer,
        document: &SceneDocument,
        index: usize,
        parent: Option<usize>,
    ) -> usize {
        let object = &document.objects[index];
        let mut node = Node::named(&object.name);
        self.setup_node(&mut node, document, index, false);
        let node_id = root.add_node(node, parent);

        if let Some(armature) = object.armature_data() {
            let world = document.matrix_world(index);
            SkinBuilder::new(buffer).attach_joints(root, node_id, armature, &world);
        }
        node_id
    }

    /// Node + mesh + skin for one mesh object (or a merge collection)
    fn make_node_mesh(
        &self,
        root: &mut Gltf,
        buffer: &mut GltfBuffer,
        document: &SceneDocument,
        name: &str,
        index: usize,
        parent: Option<usize>,
        can_merge: bool,
    ) -> (usize, Option<usize>) {
        let object = &document.objects[index];

        let need_mesh = can_merge
            || match &object.rigid_body {
                None => true,
                Some(rigid_body) => rigid_body.collision_shape == CollisionShape::Mesh,
            };

        let mesh_id = need_mesh.then(|| {
            root.meshes.push(Mesh {
                name: Some(name.to_string()),
                primitives: Vec::new(),
            });
            root.meshes.len() - 1
        });

        let mut skin_id = None;
        if let Some(armature_index) = document.armature_of(index) {
            let armature_object = &document.objects[armature_index];
            if let Some(armature) = armature_object.armature_data() {
                let armature_world = document.matrix_world(armature_index);
                let object_world = document.matrix_world(index);
                skin_id = SkinBuilder::new(buffer).build(
                    root,
                    &object.name,
                    &armature_object.name,
                    armature,
                    &armature_world,
                    &object_world,
                );
                if skin_id.is_none() {
                    warn!(
                        object = object.name.as_str(),
                        armature = armature_object.name.as_str(),
                        "armature node missing, mesh exported unskinned"
                    );
                }
            }
        }

        let mut node = Node::named(name);
        node.mesh = mesh_id;
        node.skin = skin_id;
        // setup_node may move node.mesh into a MESH collision shape;
        // the geometry still goes into the allocated mesh
        self.setup_node(&mut node, document, index, can_merge);
        let node_id = root.add_node(node, parent);
        (node_id, mesh_id)
    }

    fn make_mesh(
        &self,
        root: &mut Gltf,
        buffer: &mut GltfBuffer,
        document: &SceneDocument,
        index: usize,
        parent: Option<usize>,
    ) -> GltfResult<Option<usize>> {
        let object = &document.objects[index];
        let Some(data) = object.mesh() else {
            return Ok(None);
        };
        let armature = document.armature_of(index);
        let object_matrix = document.object_matrix(index, armature);

        let mut result = None;

        if self.can_merge(object) {
            // can_merge checked collection presence already
            let collection = object.collection.as_deref().unwrap_or(&object.name);

            let (node_id, mesh_id) = match root.find_node(collection) {
                Some(node_id) => (node_id, root.nodes[node_id].mesh),
                None => self.make_node_mesh(
                    root, buffer, document, collection, index, parent, true,
                ),
            };

            if let Some(mesh_id) = mesh_id {
                let skin_id = root.nodes[node_id].skin;
                self.assemble_geometry(
                    root,
                    buffer,
                    mesh_id,
                    object,
                    data,
                    &object_matrix,
                    skin_id,
                    true,
                );
            }
            result = Some(node_id);
        }

        if !self.can_merge(object) || self.options.keep {
            if object.property_str("type") == Some("Portal") {
                return Ok(Some(self.make_portal(root, document, index, parent)?));
            }

            let (node_id, mesh_id) = self.make_node_mesh(
                root,
                buffer,
                document,
                &object.name,
                index,
                parent,
                false,
            );
            if let Some(mesh_id) = mesh_id {
                let skin_id = root.nodes[node_id].skin;
                self.assemble_geometry(
                    root,
                    buffer,
                    mesh_id,
                    object,
                    data,
                    &object_matrix,
                    skin_id,
                    false,
                );
            }
            result = Some(node_id);
        }

        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_geometry(
        &self,
        root: &mut Gltf,
        buffer: &mut GltfBuffer,
        mesh_id: usize,
        object: &SceneObject,
        data: &sceneforge_scene::MeshData,
        object_matrix: &glam::Mat4,
        skin_id: Option<usize>,
        can_merge: bool,
    ) {
        let joints = skin_id.map(|skin| SkinBuilder::joint_map(root, skin));

        // take the mesh out so the assembler can borrow the document
        let mut mesh = std::mem::take(&mut root.meshes[mesh_id]);
        GeometryAssembler::new(buffer, self.options.geom_scale, self.options.extra_uv)
            .make_geom(
                root,
                &mut mesh,
                object,
                data,
                object_matrix,
                joints.as_ref(),
                can_merge,
            );
        root.meshes[mesh_id] = mesh;
    }

    /// Portals export as bare nodes carrying their vertices as a tag
    fn make_portal(
        &self,
        root: &mut Gltf,
        document: &SceneDocument,
        index: usize,
        parent: Option<usize>,
    ) -> GltfResult<usize> {
        let object = &document.objects[index];
        let positions: Vec<[f32; 3]> = object
            .mesh()
            .map(|data| data.vertices.iter().map(|v| v.position.to_array()).collect())
            .unwrap_or_default();

        let mut node = Node::named(&object.name);
        let extras = node.extras.get_or_insert_with(Default::default);
        extras.insert("vertices".to_string(), serde_json::to_string(&positions)?);

        self.setup_node(&mut node, document, index, false);
        Ok(root.add_node(node, parent))
    }

    fn make_light(
        &self,
        root: &mut Gltf,
        document: &SceneDocument,
        index: usize,
        parent: Option<usize>,
    ) -> usize {
        let object = &document.objects[index];
        let mut node = Node::named(&object.name);

        if let ObjectKind::Light(light) = &object.kind {
            let kind = match light.kind {
                LightKind::Point => "PointLight",
                LightKind::Spot => "SpotLight",
            };
            let scale = Transform::from_matrix(&object.matrix_local).scale;

            let extras = node.extras.get_or_insert_with(Default::default);
            extras.insert("type".to_string(), "Light".to_string());
            extras.insert("light".to_string(), kind.to_string());
            extras.insert(
                "color".to_string(),
                serde_json::json!(light.color).to_string(),
            );
            extras.insert(
                "scale".to_string(),
                serde_json::json!(scale.to_array()).to_string(),
            );
            extras.insert("energy".to_string(), format!("{:.3}", light.energy));
            extras.insert("far".to_string(), format!("{:.3}", light.shadow_soft_size));
            if light.kind == LightKind::Spot {
                extras.insert(
                    "fov".to_string(),
                    format!("{:.3}", light.spot_size.to_degrees()),
                );
            }
        }

        self.setup_node(&mut node, document, index, false);
        root.add_node(node, parent)
    }

    /// Animation-only export: the armature, its skin, and one baked
    /// action
    fn make_animation(
        &self,
        root: &mut Gltf,
        buffer: &mut GltfBuffer,
        document: &SceneDocument,
    ) -> GltfResult<()> {
        let Some(index) = document.objects.iter().position(|o| {
            o.is_visible() && matches!(o.kind, ObjectKind::Armature(_))
        }) else {
            warn!("no visible armature, nothing to export");
            return Ok(());
        };

        let object = &document.objects[index];
        let Some(armature) = object.armature_data() else {
            return Ok(());
        };
        let world = document.matrix_world(index);

        let node_id = self.make_armature(root, buffer, document, index, None);
        let skin_id = SkinBuilder::new(buffer).build(
            root,
            &object.name,
            &object.name,
            armature,
            &world,
            &world,
        );
        let mut holder = Node::named("ARMATURE");
        holder.skin = skin_id;
        root.add_node(holder, Some(node_id));

        let fallback;
        let action = match &self.options.action {
            Some(name) => document.find_action(name)?,
            None => match document.actions.first() {
                Some(action) => action,
                None => {
                    // no action at all: bake the rest pose across the
                    // scene frame range
                    fallback = Action {
                        name: "GLTF_ANIMATION".to_string(),
                        frame_start: document.frame_start,
                        frame_end: document.frame_end,
                        curves: Default::default(),
                    };
                    &fallback
                }
            },
        };

        AnimationSampler::new(buffer, &self.options.speed_scale).make_action(
            root,
            armature,
            &world,
            action,
            &document.frame_state,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_type_from_str() {
        assert_eq!("all".parse::<ExportType>().unwrap(), ExportType::All);
        assert_eq!(
            "animation".parse::<ExportType>().unwrap(),
            ExportType::Animation
        );
        assert_eq!(
            "collision".parse::<ExportType>().unwrap(),
            ExportType::Collision
        );
        assert!(matches!(
            "mesh".parse::<ExportType>(),
            Err(GltfExportError::UnknownExportType(_))
        ));
    }

    #[test]
    fn test_default_options() {
        let options = GltfExportOptions::default();
        assert_eq!(options.export_type, ExportType::All);
        assert_eq!(options.geom_scale, 1.0);
        assert!(!options.merge);
        assert!(options.extra_uv);
        assert!(options.z_up);
    }
}
