//! Mesh data structures
//!
//! Meshes arrive triangulated with modifiers applied. Polygon corners are
//! addressed through loop indices so per-corner data (UVs, tangents) can
//! differ between polygons sharing a vertex.

use std::collections::HashSet;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use sceneforge_core::BoundingBox;

/// A single bone-group influence on a vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexWeight {
    /// Index into [`MeshData::vertex_groups`]
    pub group: usize,
    pub weight: f32,
}

/// A vertex with its per-vertex attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshVertex {
    /// Position in object-local space
    pub position: Vec3,
    /// Interpolated (smooth) normal
    pub normal: Vec3,
    /// Bone influences, unordered
    #[serde(default)]
    pub groups: SmallVec<[VertexWeight; 4]>,
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position,
            normal,
            groups: SmallVec::new(),
        }
    }

    /// Number of influences with a positive weight
    pub fn influence_count(&self) -> usize {
        self.groups.iter().filter(|g| g.weight > 0.0).count()
    }
}

/// A triangulated polygon (face)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    /// Vertex indices, one per corner
    pub vertices: Vec<u32>,
    /// Loop indices, parallel to `vertices`
    pub loops: Vec<u32>,
    /// Flat face normal
    pub normal: Vec3,
    /// Smooth shading flag
    #[serde(default)]
    pub use_smooth: bool,
    /// Material slot, if the face has one assigned
    #[serde(default)]
    pub material_index: Option<usize>,
}

/// One named UV layer with per-loop coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UvLayer {
    pub name: String,
    /// Whether this is the active (primary) layer
    #[serde(default)]
    pub active: bool,
    /// One UV per loop
    pub data: Vec<Vec2>,
}

/// Per-loop tangent space for the active UV layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TangentSpace {
    pub tangent: Vec3,
    /// Bitangent handedness sign (+1 or -1)
    pub bitangent_sign: f32,
}

/// A triangulated mesh with all the attribute layers exporters consume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub uv_layers: Vec<UvLayer>,
    /// Material slot names
    #[serde(default)]
    pub materials: Vec<String>,
    /// Vertex group (bone) names, indexed by [`VertexWeight::group`]
    #[serde(default)]
    pub vertex_groups: Vec<String>,
    /// Per-loop tangents for the active UV layer, when computed
    #[serde(default)]
    pub tangents: Option<Vec<TangentSpace>>,
    /// Vertices on sharp edges; they never take the smooth normal
    #[serde(default)]
    pub sharp_vertices: HashSet<u32>,
}

impl MeshData {
    /// The active UV layer, if any
    pub fn active_uv_layer(&self) -> Option<&UvLayer> {
        self.uv_layers.iter().find(|l| l.active)
    }

    /// UV layers ordered active-first, otherwise in authoring order
    pub fn uv_layers_active_first(&self) -> Vec<&UvLayer> {
        let mut layers: Vec<&UvLayer> = self.uv_layers.iter().collect();
        layers.sort_by_key(|l| !l.active);
        layers
    }

    /// Material name for a polygon, if its slot resolves
    pub fn material_name(&self, polygon: &Polygon) -> Option<&str> {
        polygon
            .material_index
            .and_then(|i| self.materials.get(i))
            .map(String::as_str)
    }

    /// Highest positive-influence count over all vertices referenced by
    /// polygons (at least 1 when any vertex has influences)
    pub fn max_influences(&self) -> usize {
        let mut max = 0;
        for polygon in &self.polygons {
            for &vertex_id in &polygon.vertices {
                if let Some(vertex) = self.vertices.get(vertex_id as usize) {
                    max = max.max(vertex.influence_count());
                }
            }
        }
        max
    }

    /// Object-local bounding box over all vertices
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().map(|v| v.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn quad_mesh() -> MeshData {
        MeshData {
            vertices: vec![
                MeshVertex::new(Vec3::ZERO, Vec3::Z),
                MeshVertex::new(Vec3::X, Vec3::Z),
                MeshVertex::new(Vec3::Y, Vec3::Z),
                MeshVertex::new(Vec3::ONE, Vec3::Z),
            ],
            polygons: vec![
                Polygon {
                    vertices: vec![0, 1, 2],
                    loops: vec![0, 1, 2],
                    normal: Vec3::Z,
                    use_smooth: true,
                    material_index: Some(0),
                },
                Polygon {
                    vertices: vec![1, 3, 2],
                    loops: vec![3, 4, 5],
                    normal: Vec3::Z,
                    use_smooth: true,
                    material_index: None,
                },
            ],
            uv_layers: vec![],
            materials: vec!["Main".to_string()],
            vertex_groups: vec![],
            tangents: None,
            sharp_vertices: HashSet::new(),
        }
    }

    #[test]
    fn test_material_name_lookup() {
        let mesh = quad_mesh();
        assert_eq!(mesh.material_name(&mesh.polygons[0]), Some("Main"));
        assert_eq!(mesh.material_name(&mesh.polygons[1]), None);
    }

    #[test]
    fn test_uv_layers_active_first() {
        let mut mesh = quad_mesh();
        mesh.uv_layers = vec![
            UvLayer {
                name: "Lightmap".into(),
                active: false,
                data: vec![Vec2::ZERO; 6],
            },
            UvLayer {
                name: "UVMap".into(),
                active: true,
                data: vec![Vec2::ZERO; 6],
            },
        ];

        let ordered = mesh.uv_layers_active_first();
        assert_eq!(ordered[0].name, "UVMap");
        assert_eq!(ordered[1].name, "Lightmap");
    }

    #[test]
    fn test_max_influences() {
        let mut mesh = quad_mesh();
        mesh.vertices[1].groups = smallvec![
            VertexWeight { group: 0, weight: 0.5 },
            VertexWeight { group: 1, weight: 0.3 },
            VertexWeight { group: 2, weight: 0.0 },
        ];
        assert_eq!(mesh.max_influences(), 2);
    }
}
