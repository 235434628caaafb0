//! Common types used across sceneforge
//!
//! This module provides shared type definitions used by multiple crates.
//! Vector and matrix math comes from `glam`; the helpers here adapt it to
//! the conventions of the output formats (column-major matrix lists,
//! `[x, y, z, w]` quaternions).

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Decomposed local transform (translation, rotation, scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Decompose a matrix into translation, rotation and scale
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Recompose into a matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Check whether this transform is the identity (within float tolerance)
    pub fn is_identity(&self) -> bool {
        self.translation.abs_diff_eq(Vec3::ZERO, 1e-6)
            && self.scale.abs_diff_eq(Vec3::ONE, 1e-6)
            && self.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Quaternion as the `[x, y, z, w]` array the target formats expect
pub fn quat_to_array(quat: Quat) -> [f32; 4] {
    [quat.x, quat.y, quat.z, quat.w]
}

/// Matrix as a flat column-major array of 16 floats
pub fn matrix_to_array(matrix: &Mat4) -> [f32; 16] {
    matrix.to_cols_array()
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Build the box enclosing a set of points
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut iter = points.into_iter();
        let first = match iter.next() {
            Some(p) => p,
            None => return Self::ZERO,
        };
        let mut bbox = Self::new(first, first);
        for p in iter {
            bbox.expand(p);
        }
        bbox
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_roundtrip() {
        let t = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let back = Transform::from_matrix(&t.to_matrix());
        assert!(back.translation.abs_diff_eq(t.translation, 1e-5));
        assert!(back.scale.abs_diff_eq(t.scale, 1e-5));
        assert!(back.rotation.abs_diff_eq(t.rotation, 1e-5));
    }

    #[test]
    fn test_identity_detection() {
        assert!(Transform::IDENTITY.is_identity());
        assert!(!Transform {
            translation: Vec3::new(0.1, 0.0, 0.0),
            ..Transform::IDENTITY
        }
        .is_identity());
    }

    #[test]
    fn test_matrix_to_array_is_column_major() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let a = matrix_to_array(&m);

        // translation lives in the last column
        assert_eq!(&a[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_bounding_box_expand() {
        let mut bbox = BoundingBox::new(Vec3::ZERO, Vec3::ZERO);
        bbox.expand(Vec3::new(1.0, 2.0, 3.0));
        bbox.expand(Vec3::new(-1.0, -2.0, -3.0));

        assert_eq!(bbox.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(bbox.max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.size(), Vec3::new(2.0, 4.0, 6.0));
    }
}
