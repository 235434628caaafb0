//! Skin and joint-tree construction
//!
//! Joint nodes hang under their parent joint (or the armature node for
//! parentless bones) with parent-relative rest transforms. The skin's
//! joint list is ordered lexicographically by bone name so repeated
//! exports number joints identically; the inverse-bind-matrix channel
//! follows that same order.

use std::collections::BTreeMap;

use glam::Mat4;
use tracing::debug;

use sceneforge_core::{matrix_to_array, quat_to_array, Transform};
use sceneforge_scene::Armature;

use super::buffer::{ComponentType, ElementType, GltfBuffer};
use super::{Gltf, Node, Skin};

/// Builds joint hierarchies and skins against the shared buffer
pub struct SkinBuilder<'a> {
    buffer: &'a mut GltfBuffer,
}

impl<'a> SkinBuilder<'a> {
    pub fn new(buffer: &'a mut GltfBuffer) -> Self {
        Self { buffer }
    }

    /// Attach one node per bone under the armature node.
    ///
    /// Bones are visited parents-first (children of equal depth in name
    /// order) so every parent joint exists before its children; the
    /// node's local transform is the bone's rest matrix relative to its
    /// parent bone, with the armature world matrix folded into roots.
    pub fn attach_joints(
        &mut self,
        root: &mut Gltf,
        armature_node: usize,
        armature: &Armature,
        armature_world: &Mat4,
    ) {
        let mut node_ids: Vec<Option<usize>> = vec![None; armature.bones.len()];
        let mut pending: Vec<usize> = armature.sorted_bone_indices();

        // name-sorted passes; every pass places all bones whose parent
        // is already placed, so depth d lands on pass d+1
        while !pending.is_empty() {
            let mut deferred = Vec::new();
            for bone_index in pending {
                let bone = &armature.bones[bone_index];
                let parent_node = match bone.parent {
                    Some(parent) => match node_ids[parent] {
                        Some(id) => id,
                        None => {
                            deferred.push(bone_index);
                            continue;
                        }
                    },
                    None => armature_node,
                };

                let mut local = armature.rest_relative(bone_index);
                if bone.parent.is_none() {
                    local = *armature_world * local;
                }
                let transform = Transform::from_matrix(&local);

                let joint = Node {
                    name: Some(bone.name.clone()),
                    rotation: Some(quat_to_array(transform.rotation)),
                    scale: Some(transform.scale.to_array()),
                    translation: Some(transform.translation.to_array()),
                    ..Node::default()
                };
                node_ids[bone_index] = Some(root.add_node(joint, Some(parent_node)));
            }
            pending = deferred;
        }
    }

    /// Build a skin binding `object_name`'s mesh to the armature.
    ///
    /// Returns `None` when no node with the armature's name exists yet;
    /// the caller decides whether that is fatal. Bones whose joint node
    /// is missing from the document are skipped.
    pub fn build(
        &mut self,
        root: &mut Gltf,
        object_name: &str,
        armature_name: &str,
        armature: &Armature,
        armature_world: &Mat4,
        object_world: &Mat4,
    ) -> Option<usize> {
        root.find_node(armature_name)?;

        let channel = self.buffer.add_channel(ComponentType::Float, ElementType::Mat4);

        let mut skin = Skin {
            name: Some(format!("{object_name}_{armature_name}")),
            joints: Vec::new(),
            inverse_bind_matrices: channel,
        };

        let armature_world_inv = armature_world.inverse();
        for bone_index in armature.sorted_bone_indices() {
            let bone = &armature.bones[bone_index];
            let Some(joint_id) = root.find_node(&bone.name) else {
                continue;
            };

            let inverse_bind =
                bone.matrix_local.inverse() * armature_world_inv * *object_world;
            self.buffer.write(channel, &matrix_to_array(&inverse_bind));

            skin.joints.push(joint_id);
        }

        debug!(
            skin = skin.name.as_deref().unwrap_or(""),
            joints = skin.joints.len(),
            "built skin"
        );

        root.skins.push(skin);
        Some(root.skins.len() - 1)
    }

    /// Joint-name to joint-index mapping for a skin, the order per-vertex
    /// JOINTS attributes refer to
    pub fn joint_map(root: &Gltf, skin_id: usize) -> BTreeMap<String, u16> {
        let mut map = BTreeMap::new();
        for (i, &node_id) in root.skins[skin_id].joints.iter().enumerate() {
            if let Some(name) = &root.nodes[node_id].name {
                map.insert(name.clone(), i as u16);
            }
        }
        map
    }
}
