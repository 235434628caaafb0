//! Vertex attribute encoding
//!
//! Turns one polygon corner into writes against the primitive's
//! attribute channels. Position/normal channels exist from primitive
//! creation; UV, tangent and joint channels appear lazily on first use.

use glam::{Mat4, Quat, Vec3};

use sceneforge_scene::{MeshVertex, Polygon};

use super::buffer::{ComponentType, ElementType, GltfBuffer};
use super::Primitive;

/// Influences per JOINTS/WEIGHTS layer
pub const JOINTS_PER_LAYER: usize = 4;

/// One packed influence layer: four (joint, weight) pairs
pub type JointLayer = [(u16, f32); JOINTS_PER_LAYER];

/// Encodes single vertices against a primitive's channels
pub struct VertexEncoder<'a> {
    buffer: &'a mut GltfBuffer,
    /// Set when multiple source objects merge into one primitive; the
    /// node transform no longer carries the object offset then
    merge_matrix: Option<Mat4>,
    merge_rotation: Quat,
    geom_scale: f32,
}

impl<'a> VertexEncoder<'a> {
    pub fn new(buffer: &'a mut GltfBuffer, object_matrix: &Mat4, merge: bool, geom_scale: f32) -> Self {
        let (_, rotation, _) = object_matrix.to_scale_rotation_translation();
        Self {
            buffer,
            merge_matrix: merge.then_some(*object_matrix),
            merge_rotation: rotation,
            geom_scale,
        }
    }

    /// The underlying buffer, for index writes and channel creation
    /// interleaved with attribute encoding
    pub fn buffer(&mut self) -> &mut GltfBuffer {
        self.buffer
    }

    /// Write exactly one POSITION and one NORMAL entry for a corner.
    ///
    /// Positions stay in object-local space unless objects are merged
    /// (the node transform already encodes the offset). The normal is
    /// the interpolated vertex normal when the corner shades smooth,
    /// else the flat face normal; merging rotates it by the object's
    /// rotation component only.
    pub fn write_vertex(
        &mut self,
        primitive: &Primitive,
        polygon: &Polygon,
        vertex: &MeshVertex,
        use_smooth: bool,
    ) {
        let local = vertex.position * self.geom_scale;
        let position = match &self.merge_matrix {
            Some(matrix) => matrix.transform_point3(local),
            None => local,
        };
        self.buffer
            .write(primitive.attributes["POSITION"], &position.to_array());

        let source_normal = if use_smooth { vertex.normal } else { polygon.normal };
        let normal = if self.merge_matrix.is_some() {
            self.merge_rotation * source_normal
        } else {
            source_normal
        };
        self.buffer
            .write(primitive.attributes["NORMAL"], &normal.to_array());
    }

    /// Write one UV into the `TEXCOORD_{uv_id}` channel, creating it on
    /// first use. V flips to match the target convention.
    pub fn write_uv(&mut self, primitive: &mut Primitive, uv_id: usize, u: f32, v: f32) {
        let texcoord = format!("TEXCOORD_{uv_id}");
        let channel = *primitive.attributes.entry(texcoord).or_insert_with(|| {
            self.buffer.add_channel(ComponentType::Float, ElementType::Vec2)
        });

        self.buffer.write(channel, &[u, 1.0 - v]);
    }

    /// Write one tangent (xyz + bitangent sign) as VEC4
    pub fn write_tangent(
        &mut self,
        primitive: &mut Primitive,
        tangent: Vec3,
        bitangent_sign: f32,
    ) {
        let channel = *primitive
            .attributes
            .entry("TANGENT".to_string())
            .or_insert_with(|| {
                self.buffer.add_channel(ComponentType::Float, ElementType::Vec4)
            });

        let tangent = match &self.merge_matrix {
            Some(matrix) => matrix.transform_vector3(tangent),
            None => tangent,
        };
        self.buffer.write(
            channel,
            &[tangent.x, tangent.y, tangent.z, bitangent_sign],
        );
    }

    /// Write one vertex's JOINTS_n/WEIGHTS_n layers.
    ///
    /// Joint channels use unsigned bytes while the skin's joint count
    /// fits, unsigned shorts otherwise; the choice is per skin and
    /// never changes mid-document.
    pub fn write_joints_weights(
        &mut self,
        primitive: &mut Primitive,
        joint_count: usize,
        layers: &[JointLayer],
    ) {
        for (i, layer) in layers.iter().enumerate() {
            let joints_name = format!("JOINTS_{i}");
            let joints_channel = *primitive.attributes.entry(joints_name).or_insert_with(|| {
                let component_type = if joint_count > 255 {
                    ComponentType::UnsignedShort
                } else {
                    ComponentType::UnsignedByte
                };
                self.buffer.add_channel(component_type, ElementType::Vec4)
            });
            let joints: Vec<f32> = layer.iter().map(|&(joint, _)| joint as f32).collect();
            self.buffer.write(joints_channel, &joints);

            let weights_name = format!("WEIGHTS_{i}");
            let weights_channel = *primitive
                .attributes
                .entry(weights_name)
                .or_insert_with(|| {
                    self.buffer.add_channel(ComponentType::Float, ElementType::Vec4)
                });
            let weights: Vec<f32> = layer.iter().map(|&(_, weight)| weight).collect();
            self.buffer.write(weights_channel, &weights);
        }
    }
}
