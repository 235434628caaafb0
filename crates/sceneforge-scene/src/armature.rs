//! Armature (skeleton) structures
//!
//! Bone rest matrices are stored in armature space, mirroring how DCC
//! tools expose them. Parent-relative matrices are derived on demand.

use std::collections::HashMap;

use glam::Mat4;
use serde::{Deserialize, Serialize};

/// A single bone in rest pose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    /// Parent bone index within the armature
    #[serde(default)]
    pub parent: Option<usize>,
    /// Rest matrix in armature space
    pub matrix_local: Mat4,
}

/// Skeleton data owned by an armature object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Armature {
    pub bones: Vec<Bone>,
}

impl Armature {
    /// Bone name to index mapping
    pub fn bone_map(&self) -> HashMap<&str, usize> {
        self.bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.as_str(), i))
            .collect()
    }

    /// Find bone index by name
    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Bone indices ordered lexicographically by name.
    ///
    /// Exports walk bones in this order so repeated runs produce the same
    /// joint numbering.
    pub fn sorted_bone_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.bones.len()).collect();
        indices.sort_by(|&a, &b| self.bones[a].name.cmp(&self.bones[b].name));
        indices
    }

    /// Rest matrix of a bone relative to its parent bone.
    ///
    /// Root bones return their armature-space rest matrix unchanged;
    /// callers premultiply the armature world matrix where needed.
    pub fn rest_relative(&self, bone_index: usize) -> Mat4 {
        let bone = &self.bones[bone_index];
        match bone.parent {
            Some(parent) => self.bones[parent].matrix_local.inverse() * bone.matrix_local,
            None => bone.matrix_local,
        }
    }

    /// Validate parent indices and name uniqueness
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashMap::new();
        for (idx, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= self.bones.len() {
                    return Err(format!(
                        "bone {} has out-of-range parent {}",
                        bone.name, parent
                    ));
                }
                if parent == idx {
                    return Err(format!("bone {} is its own parent", bone.name));
                }
            }
            if let Some(&other) = seen.get(&bone.name) {
                return Err(format!(
                    "duplicate bone name {} at indices {} and {}",
                    bone.name, other, idx
                ));
            }
            seen.insert(bone.name.clone(), idx);
        }
        Ok(())
    }
}
