//! Mesh geometry assembly
//!
//! Splits a mesh into one primitive per distinct material (plus a
//! group for faces without one) and streams every polygon corner
//! through the vertex encoder. A per-mesh cache lets smooth-shaded
//! corners that agree on source vertex and active UV reuse an already
//! emitted index instead of duplicating attribute data.

use std::collections::{BTreeMap, HashMap};

use glam::{Mat4, Vec2};
use tracing::{debug, trace};

use sceneforge_scene::{MeshData, MeshVertex, SceneObject};

use super::buffer::{ComponentType, ElementType, GltfBuffer};
use super::vertex::{JointLayer, VertexEncoder, JOINTS_PER_LAYER};
use super::{Gltf, Material, Mesh, Primitive};

/// Streams mesh polygons into glTF primitives over the shared buffer
pub struct GeometryAssembler<'a> {
    buffer: &'a mut GltfBuffer,
    geom_scale: f32,
    /// Export non-active UV layers as TEXCOORD_1..n
    extra_uv: bool,
}

impl<'a> GeometryAssembler<'a> {
    pub fn new(buffer: &'a mut GltfBuffer, geom_scale: f32, extra_uv: bool) -> Self {
        Self {
            buffer,
            geom_scale,
            extra_uv,
        }
    }

    /// Append one object's geometry to `mesh`.
    ///
    /// With `can_merge` the target mesh may already hold primitives
    /// from earlier objects; faces then join the existing primitive of
    /// their material and index numbering continues where it left off.
    /// `joints` is the skin's bone-name to joint-index mapping when the
    /// object deforms, `None` otherwise.
    pub fn make_geom(
        &mut self,
        root: &mut Gltf,
        mesh: &mut Mesh,
        object: &SceneObject,
        data: &MeshData,
        object_matrix: &Mat4,
        joints: Option<&BTreeMap<String, u16>>,
        can_merge: bool,
    ) {
        let collision = object.is_collision();

        // register this mesh's materials, deduplicated by name
        let mut material_ids: HashMap<&str, usize> = HashMap::new();
        if !collision {
            for name in &data.materials {
                let id = material_index(root, name);
                material_ids.insert(name.as_str(), id);
            }
        }

        // primitive per material name; on merge, pick up where earlier
        // objects stopped
        let mut primitives: HashMap<Option<String>, usize> = HashMap::new();
        if can_merge {
            for (i, primitive) in mesh.primitives.iter().enumerate() {
                let name = primitive
                    .material
                    .and_then(|m| root.materials[m].name.clone());
                primitives.insert(name, i);
            }
        }

        let joint_layers = joints.map(|_| {
            let influences = data.max_influences().max(1);
            influences.div_ceil(JOINTS_PER_LAYER)
        });

        let mut encoder =
            VertexEncoder::new(self.buffer, object_matrix, can_merge, self.geom_scale);

        // source vertex id to emitted (index, active UV) pairs
        let mut cache: HashMap<u32, Vec<(i64, Vec2)>> = HashMap::new();

        let uv_layers = data.uv_layers_active_first();

        for polygon in &data.polygons {
            let material_name = data.material_name(polygon).map(str::to_owned);

            let primitive_id = match primitives.get(&material_name) {
                Some(&id) => id,
                None => {
                    mesh.primitives.push(make_primitive(encoder.buffer()));
                    let id = mesh.primitives.len() - 1;
                    primitives.insert(material_name.clone(), id);
                    id
                }
            };

            if !collision {
                if let Some(name) = &material_name {
                    mesh.primitives[primitive_id].material =
                        material_ids.get(name.as_str()).copied();
                }
            }

            for (corner, &vertex_id) in polygon.vertices.iter().enumerate() {
                let loop_id = polygon.loops[corner] as usize;
                let vertex = &data.vertices[vertex_id as usize];
                let use_smooth = polygon.use_smooth
                    && !data.sharp_vertices.contains(&vertex_id)
                    && !collision;

                let active_uv = if collision {
                    Vec2::ZERO
                } else {
                    uv_layers
                        .iter()
                        .find(|layer| layer.active)
                        .map(|layer| layer.data[loop_id])
                        .unwrap_or(Vec2::ZERO)
                };

                // reuse a shared vertex when shading and UV agree
                if polygon.use_smooth && !collision {
                    if let Some(entries) = cache.get(&vertex_id) {
                        if let Some(&(index, _)) =
                            entries.iter().find(|&&(_, uv)| uv == active_uv)
                        {
                            let indices = mesh.primitives[primitive_id].indices;
                            encoder.buffer().write(indices, &[index as f32]);
                            continue;
                        }
                    }
                }

                encoder.write_vertex(
                    &mesh.primitives[primitive_id],
                    polygon,
                    vertex,
                    use_smooth,
                );

                if !collision {
                    for (uv_id, layer) in uv_layers.iter().enumerate() {
                        if !layer.active && !self.extra_uv {
                            continue;
                        }
                        let uv = layer.data[loop_id];
                        encoder.write_uv(
                            &mut mesh.primitives[primitive_id],
                            uv_id,
                            uv.x,
                            uv.y,
                        );
                        if layer.active {
                            if let Some(tangents) = &data.tangents {
                                let space = &tangents[loop_id];
                                encoder.write_tangent(
                                    &mut mesh.primitives[primitive_id],
                                    space.tangent,
                                    space.bitangent_sign,
                                );
                            }
                        }
                    }
                }

                let primitive = &mut mesh.primitives[primitive_id];
                primitive.highest_index += 1;
                let index = primitive.highest_index;
                let indices = primitive.indices;
                encoder.buffer().write(indices, &[index as f32]);
                cache.entry(vertex_id).or_default().push((index, active_uv));

                if let (Some(joints), Some(layers)) = (joints, joint_layers) {
                    let packed = pack_influences(vertex, &data.vertex_groups, joints, layers);
                    encoder.write_joints_weights(
                        &mut mesh.primitives[primitive_id],
                        joints.len(),
                        &packed,
                    );
                }
            }
        }

        trace!(
            object = object.name.as_str(),
            primitives = mesh.primitives.len(),
            "assembled geometry"
        );
    }
}

/// New primitive with its index, NORMAL and POSITION channels
fn make_primitive(buffer: &mut GltfBuffer) -> Primitive {
    let indices = buffer.add_channel(ComponentType::UnsignedShort, ElementType::Scalar);
    let normal = buffer.add_channel(ComponentType::Float, ElementType::Vec3);
    let position = buffer.add_channel(ComponentType::Float, ElementType::Vec3);

    let mut attributes = BTreeMap::new();
    attributes.insert("NORMAL".to_string(), normal);
    attributes.insert("POSITION".to_string(), position);

    Primitive {
        attributes,
        indices,
        material: None,
        highest_index: -1,
    }
}

fn material_index(root: &mut Gltf, name: &str) -> usize {
    if let Some(i) = root
        .materials
        .iter()
        .position(|m| m.name.as_deref() == Some(name))
    {
        return i;
    }
    root.materials.push(Material {
        name: Some(name.to_string()),
    });
    debug!(material = name, "registered material");
    root.materials.len() - 1
}

/// Pack a vertex's influences into fixed-width joint/weight layers.
///
/// Non-zero weights are taken heaviest first, four per layer, until
/// `layers` layers fill up; weights on groups the skin does not know
/// are skipped. Remaining slots and layers pad with (0, 0).
fn pack_influences(
    vertex: &MeshVertex,
    vertex_groups: &[String],
    joints: &BTreeMap<String, u16>,
    layers: usize,
) -> Vec<JointLayer> {
    let mut sorted: Vec<_> = vertex.groups.iter().collect();
    sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let mut packed: Vec<Vec<(u16, f32)>> = Vec::new();
    for influence in sorted {
        if influence.weight <= 0.0 {
            continue;
        }
        let Some(name) = vertex_groups.get(influence.group) else {
            continue;
        };
        let Some(&joint) = joints.get(name) else {
            continue;
        };

        if packed.last().map_or(true, |layer| layer.len() >= JOINTS_PER_LAYER) {
            if packed.len() >= layers {
                break;
            }
            packed.push(Vec::new());
        }
        if let Some(layer) = packed.last_mut() {
            layer.push((joint, influence.weight));
        }
    }

    let mut result: Vec<JointLayer> = packed
        .into_iter()
        .map(|layer| {
            let mut fixed: JointLayer = [(0, 0.0); JOINTS_PER_LAYER];
            fixed[..layer.len()].copy_from_slice(&layer);
            fixed
        })
        .collect();
    result.resize(layers, [(0, 0.0); JOINTS_PER_LAYER]);
    result
}
