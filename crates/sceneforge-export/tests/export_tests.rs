//! End-to-end conversion tests
//!
//! These run whole scene documents through the exporter and check the
//! resulting glTF document, the binary buffer layout, and the GLB
//! container against each other.

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::{Mat4, Vec2, Vec3};
use smallvec::smallvec;

use sceneforge_export::gltf::{
    glb, ExportType, GltfExportOptions, GltfExporter, Primitive, SpeedScale,
    COMPONENT_TYPE_UNSIGNED_BYTE, COMPONENT_TYPE_UNSIGNED_SHORT,
};
use sceneforge_scene::{
    Action, Armature, Bone, BoneCurves, CollisionShape, Keyframe, MeshData, MeshVertex,
    ObjectKind, Polygon, RigidBody, SceneDocument, SceneObject, UvLayer, VertexWeight,
};

fn object(name: &str, kind: ObjectKind) -> SceneObject {
    SceneObject {
        name: name.to_string(),
        parent: None,
        matrix_local: Mat4::IDENTITY,
        collection: None,
        armature: None,
        properties: BTreeMap::new(),
        hidden: false,
        rigid_body: None,
        kind,
    }
}

fn document(objects: Vec<SceneObject>) -> SceneDocument {
    SceneDocument {
        name: "TestScene".to_string(),
        objects,
        actions: Vec::new(),
        frame_start: 1.0,
        frame_end: 1.0,
        frame_state: Default::default(),
    }
}

/// Two smooth triangles sharing an edge, with matching UVs on the
/// shared corners
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
                material_index: None,
            },
            Polygon {
                vertices: vec![1, 3, 2],
                loops: vec![3, 4, 5],
                normal: Vec3::Z,
                use_smooth: true,
                material_index: None,
            },
        ],
        uv_layers: vec![UvLayer {
            name: "UVMap".to_string(),
            active: true,
            data: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
        }],
        materials: Vec::new(),
        vertex_groups: Vec::new(),
        tangents: None,
        sharp_vertices: HashSet::new(),
    }
}

fn two_bone_armature() -> Armature {
    Armature {
        bones: vec![
            Bone {
                name: "spine".to_string(),
                parent: None,
                matrix_local: Mat4::IDENTITY,
            },
            Bone {
                name: "arm".to_string(),
                parent: Some(0),
                matrix_local: Mat4::from_translation(Vec3::Y),
            },
        ],
    }
}

fn convert(document: &SceneDocument) -> sceneforge_export::GltfOutput {
    GltfExporter::new(GltfExportOptions::default())
        .convert(document)
        .unwrap()
}

fn primitive_bytes<'a>(
    output: &'a sceneforge_export::GltfOutput,
    channel: usize,
) -> &'a [u8] {
    let view = &output.document.buffer_views[channel];
    &output.blob[view.byte_offset..view.byte_offset + view.byte_length]
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

mod scene_tests {
    use super::*;

    #[test]
    fn test_buffer_views_tile_blob() {
        let doc = document(vec![object("Quad", ObjectKind::Mesh(quad_mesh()))]);
        let output = convert(&doc);

        let mut offset = 0;
        for view in &output.document.buffer_views {
            assert_eq!(view.byte_offset, offset);
            offset += view.byte_length;
        }
        assert_eq!(offset, output.blob.len());

        // accessors and views pair one to one
        assert_eq!(
            output.document.accessors.len(),
            output.document.buffer_views.len()
        );
    }

    #[test]
    fn test_shared_smooth_vertices_emit_once() {
        let doc = document(vec![object("Quad", ObjectKind::Mesh(quad_mesh()))]);
        let output = convert(&doc);

        let primitive = &output.document.meshes[0].primitives[0];
        let position = primitive.attributes["POSITION"];
        let indices = primitive.indices;

        assert_eq!(output.document.accessors[position].count, 4);
        assert_eq!(output.document.accessors[indices].count, 6);
    }

    #[test]
    fn test_uv_v_flipped() {
        let mut mesh = quad_mesh();
        mesh.uv_layers[0].data[0] = Vec2::new(0.25, 0.75);
        let doc = document(vec![object("Quad", ObjectKind::Mesh(mesh))]);
        let output = convert(&doc);

        let primitive = &output.document.meshes[0].primitives[0];
        let uvs = floats(primitive_bytes(&output, primitive.attributes["TEXCOORD_0"]));
        assert_eq!(&uvs[0..2], &[0.25, 0.25]);
    }

    #[test]
    fn test_node_transform_and_scene_wiring() {
        let mut cube = object("Cube", ObjectKind::Mesh(quad_mesh()));
        cube.matrix_local = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let doc = document(vec![cube]);
        let output = convert(&doc);

        assert_eq!(output.document.scene, Some(0));
        assert_eq!(output.document.scenes[0].nodes, vec![0]);

        let node = &output.document.nodes[0];
        assert_eq!(node.name.as_deref(), Some("Cube"));
        assert_eq!(node.translation, Some([1.0, 2.0, 3.0]));
        assert_eq!(node.mesh, Some(0));
    }

    #[test]
    fn test_z_up_extension_follows_option() {
        let doc = document(vec![object("Anchor", ObjectKind::Empty)]);

        let output = convert(&doc);
        assert_eq!(output.document.extensions_used, vec!["BP_zup".to_string()]);

        let options = GltfExportOptions {
            z_up: false,
            ..Default::default()
        };
        let output = GltfExporter::new(options).convert(&doc).unwrap();
        assert!(output.document.extensions_used.is_empty());
    }

    #[test]
    fn test_hidden_objects_skipped() {
        let mut hidden = object("Gizmo", ObjectKind::Empty);
        hidden.hidden = true;
        let doc = document(vec![hidden, object("Anchor", ObjectKind::Empty)]);
        let output = convert(&doc);

        assert_eq!(output.document.nodes.len(), 1);
        assert_eq!(output.document.nodes[0].name.as_deref(), Some("Anchor"));
    }

    #[test]
    fn test_default_material_reserved() {
        let mut mesh = quad_mesh();
        mesh.materials = vec!["Steel".to_string()];
        mesh.polygons[0].material_index = Some(0);
        mesh.polygons[1].material_index = Some(0);
        let doc = document(vec![object("Quad", ObjectKind::Mesh(mesh))]);
        let output = convert(&doc);

        assert_eq!(
            output.document.materials[0].name.as_deref(),
            Some("GLTF_DEFAULT_MATERIAL")
        );
        assert_eq!(output.document.materials[1].name.as_deref(), Some("Steel"));
        assert_eq!(output.document.meshes[0].primitives[0].material, Some(1));
    }

    #[test]
    fn test_property_tags_stringified() {
        let mut cube = object("Cube", ObjectKind::Mesh(quad_mesh()));
        cube.properties
            .insert("type".to_string(), serde_json::json!("Prop"));
        cube.properties
            .insert("weight".to_string(), serde_json::json!(12.5));
        let doc = document(vec![cube]);
        let output = convert(&doc);

        let extras = output.document.nodes[0].extras.as_ref().unwrap();
        assert_eq!(extras["type"], "Prop");
        assert_eq!(extras["weight"], "12.5");
    }

    #[test]
    fn test_portal_exports_vertices_tag() {
        let mut portal = object("Doorway", ObjectKind::Mesh(quad_mesh()));
        portal
            .properties
            .insert("type".to_string(), serde_json::json!("Portal"));
        let doc = document(vec![portal]);
        let output = convert(&doc);

        let node = &output.document.nodes[0];
        assert_eq!(node.mesh, None);
        assert!(output.document.meshes.is_empty());

        let extras = node.extras.as_ref().unwrap();
        let vertices: Vec<[f32; 3]> = serde_json::from_str(&extras["vertices"]).unwrap();
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[1], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_light_exports_as_tags() {
        let light = object(
            "Lamp",
            ObjectKind::Light(sceneforge_scene::Light {
                kind: sceneforge_scene::LightKind::Spot,
                color: [1.0, 0.5, 0.25],
                energy: 100.0,
                shadow_soft_size: 0.5,
                spot_size: std::f32::consts::FRAC_PI_2,
            }),
        );
        let doc = document(vec![light]);
        let output = convert(&doc);

        let extras = output.document.nodes[0].extras.as_ref().unwrap();
        assert_eq!(extras["type"], "Light");
        assert_eq!(extras["light"], "SpotLight");
        assert_eq!(extras["energy"], "100.000");
        assert_eq!(extras["fov"], "90.000");
    }
}

mod skin_tests {
    use super::*;

    fn skinned_scene() -> SceneDocument {
        let mut mesh = quad_mesh();
        mesh.vertex_groups = vec!["spine".to_string(), "arm".to_string()];
        for vertex in &mut mesh.vertices {
            vertex.groups = smallvec![
                VertexWeight { group: 0, weight: 0.7 },
                VertexWeight { group: 1, weight: 0.3 },
            ];
        }

        let rig = object("Rig", ObjectKind::Armature(two_bone_armature()));
        let mut body = object("Body", ObjectKind::Mesh(mesh));
        body.parent = Some(0);
        body.armature = Some("Rig".to_string());

        document(vec![rig, body])
    }

    #[test]
    fn test_skin_and_joints_wired() {
        let output = convert(&skinned_scene());
        let doc = &output.document;

        assert_eq!(doc.skins.len(), 1);
        let skin = &doc.skins[0];
        assert_eq!(skin.name.as_deref(), Some("Body_Rig"));

        // joint order is by bone name
        let names: Vec<&str> = skin
            .joints
            .iter()
            .map(|&j| doc.nodes[j].name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["arm", "spine"]);

        // inverse bind matrices: one MAT4 per joint
        let ibm = &doc.accessors[skin.inverse_bind_matrices];
        assert_eq!(ibm.count, 2);
        assert_eq!(ibm.accessor_type, "MAT4");

        let body = doc.find_node("Body").unwrap();
        assert_eq!(doc.nodes[body].skin, Some(0));
        // skinned nodes carry no TRS of their own
        assert_eq!(doc.nodes[body].translation, None);
    }

    #[test]
    fn test_joint_indices_are_bytes_for_small_skins() {
        let output = convert(&skinned_scene());
        let doc = &output.document;

        let primitive = &doc.meshes[0].primitives[0];
        let joints = &doc.accessors[primitive.attributes["JOINTS_0"]];
        assert_eq!(joints.component_type, COMPONENT_TYPE_UNSIGNED_BYTE);
        assert_eq!(joints.accessor_type, "VEC4");

        let weights = &doc.accessors[primitive.attributes["WEIGHTS_0"]];
        assert_eq!(weights.count, joints.count);

        // two influences fit one layer
        assert!(!primitive.attributes.contains_key("JOINTS_1"));
    }

    #[test]
    fn test_weights_sorted_and_padded() {
        let output = convert(&skinned_scene());
        let doc = &output.document;

        let primitive = &doc.meshes[0].primitives[0];
        let weights = floats(primitive_bytes(
            &output,
            primitive.attributes["WEIGHTS_0"],
        ));
        // heaviest first, two zero pads
        assert_eq!(&weights[0..4], &[0.7, 0.3, 0.0, 0.0]);
    }
}

mod animation_tests {
    use super::*;

    fn animated_scene() -> SceneDocument {
        let mut curves = HashMap::new();
        curves.insert(
            "spine".to_string(),
            BoneCurves {
                rotation: Vec::new(),
                scale: Vec::new(),
                translation: vec![
                    Keyframe { frame: 1.0, value: Vec3::ZERO },
                    Keyframe { frame: 3.0, value: Vec3::X },
                ],
            },
        );

        let mut doc = document(vec![object(
            "Rig",
            ObjectKind::Armature(two_bone_armature()),
        )]);
        doc.actions.push(Action {
            name: "walk".to_string(),
            frame_start: 1.0,
            frame_end: 3.0,
            curves,
        });
        doc.frame_end = 3.0;
        doc
    }

    #[test]
    fn test_animation_export_input_is_sample_index() {
        let doc = animated_scene();
        let options = GltfExportOptions {
            export_type: ExportType::Animation,
            ..Default::default()
        };
        let output = GltfExporter::new(options).convert(&doc).unwrap();

        let animation = &output.document.animations[0];
        assert_eq!(animation.name.as_deref(), Some("walk"));
        // two bones, three channels each
        assert_eq!(animation.channels.len(), 6);

        let input = animation.samplers[0].input;
        let values = floats(primitive_bytes(&output, input));
        assert_eq!(values, vec![0.0, 1.0, 2.0]);

        // every sampler shares the one input channel
        assert!(animation.samplers.iter().all(|s| s.input == input));
    }

    #[test]
    fn test_animation_restores_frame_pointer() {
        let doc = animated_scene();
        let options = GltfExportOptions {
            export_type: ExportType::Animation,
            ..Default::default()
        };
        GltfExporter::new(options).convert(&doc).unwrap();
        assert_eq!(doc.frame_state.frame(), 0);
        assert_eq!(doc.frame_state.subframe(), 0.0);
    }

    #[test]
    fn test_speed_scale_function() {
        let doc = animated_scene();
        let options = GltfExportOptions {
            export_type: ExportType::Animation,
            speed_scale: SpeedScale::Fixed(2.0),
            ..Default::default()
        };
        let output = GltfExporter::new(options).convert(&doc).unwrap();

        // frames 1 and 3
        let input = output.document.animations[0].samplers[0].input;
        assert_eq!(output.document.accessors[input].count, 2);
    }
}

mod collision_tests {
    use super::*;

    fn collision_scene(shape: CollisionShape) -> SceneDocument {
        let mut wall = object("Wall", ObjectKind::Mesh(quad_mesh()));
        wall.rigid_body = Some(RigidBody {
            collision_shape: shape,
            passive: true,
            ghost: false,
        });
        document(vec![wall, object("Decor", ObjectKind::Mesh(quad_mesh()))])
    }

    #[test]
    fn test_collision_extension_block() {
        let output = convert(&collision_scene(CollisionShape::Box));
        let node = &output.document.nodes[0];

        let physics = node
            .extensions
            .as_ref()
            .and_then(|e| e.physics.as_ref())
            .unwrap();
        assert!(physics.is_static);
        assert!(!physics.intangible);

        let shape = &physics.collision_shapes[0];
        assert_eq!(shape.shape_type, "BOX");
        assert_eq!(shape.bounding_box, [1.0, 1.0, 1.0]);
        // box shapes keep no mesh reference at all
        assert_eq!(shape.mesh, None);
        assert_eq!(node.mesh, None);
    }

    #[test]
    fn test_mesh_shape_moves_mesh_into_extension() {
        let output = convert(&collision_scene(CollisionShape::Mesh));
        let node = &output.document.nodes[0];

        let physics = node
            .extensions
            .as_ref()
            .and_then(|e| e.physics.as_ref())
            .unwrap();
        assert_eq!(physics.collision_shapes[0].mesh, Some(0));
        assert_eq!(node.mesh, None);
    }

    #[test]
    fn test_collision_export_filters_visuals() {
        let doc = collision_scene(CollisionShape::Box);
        let options = GltfExportOptions {
            export_type: ExportType::Collision,
            ..Default::default()
        };
        let output = GltfExporter::new(options).convert(&doc).unwrap();

        assert_eq!(output.document.nodes.len(), 1);
        assert_eq!(output.document.nodes[0].name.as_deref(), Some("Wall"));
    }

    #[test]
    fn test_collision_geometry_has_no_uvs() {
        let output = convert(&collision_scene(CollisionShape::Mesh));
        let primitive = &output.document.meshes[0].primitives[0];
        assert!(!primitive.attributes.contains_key("TEXCOORD_0"));
        // flat geometry, nothing shared
        let position = primitive.attributes["POSITION"];
        assert_eq!(output.document.accessors[position].count, 6);
    }
}

mod merge_tests {
    use super::*;

    fn merged_scene() -> SceneDocument {
        let mut a = object("CrateA", ObjectKind::Mesh(quad_mesh()));
        a.collection = Some("Props".to_string());
        a.matrix_local = Mat4::from_translation(Vec3::X * 5.0);
        let mut b = object("CrateB", ObjectKind::Mesh(quad_mesh()));
        b.collection = Some("Props".to_string());
        document(vec![a, b])
    }

    #[test]
    fn test_merge_collapses_collection() {
        let doc = merged_scene();
        let options = GltfExportOptions {
            merge: true,
            ..Default::default()
        };
        let output = GltfExporter::new(options).convert(&doc).unwrap();

        assert_eq!(output.document.nodes.len(), 1);
        let node = &output.document.nodes[0];
        assert_eq!(node.name.as_deref(), Some("Props"));
        // merged nodes bake transforms into vertices
        assert_eq!(node.translation, None);
        assert_eq!(node.extras.as_ref().unwrap()["type"], "Merged");

        // both quads in one mesh, indices keep counting
        assert_eq!(output.document.meshes.len(), 1);
        let primitive = &output.document.meshes[0].primitives[0];
        let indices = primitive.indices;
        assert_eq!(output.document.accessors[indices].count, 12);

        let positions = floats(primitive_bytes(
            &output,
            primitive.attributes["POSITION"],
        ));
        // CrateA's offset is baked into its positions
        assert_eq!(positions[0], 5.0);
    }

    #[test]
    fn test_keep_retains_individual_nodes() {
        let doc = merged_scene();
        let options = GltfExportOptions {
            merge: true,
            keep: true,
            ..Default::default()
        };
        let output = GltfExporter::new(options).convert(&doc).unwrap();

        let names: Vec<&str> = output
            .document
            .nodes
            .iter()
            .filter_map(|n| n.name.as_deref())
            .collect();
        assert!(names.contains(&"Props"));
        assert!(names.contains(&"CrateA"));
        assert!(names.contains(&"CrateB"));
    }
}

mod glb_tests {
    use super::*;

    #[test]
    fn test_glb_round_trip_buffer_length() {
        let doc = document(vec![object("Quad", ObjectKind::Mesh(quad_mesh()))]);
        let output = convert(&doc);

        let container = output.glb_bytes().unwrap();
        let chunks = glb::read(&container).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&chunks.json).unwrap();
        let declared = parsed["buffers"][0]["byteLength"].as_u64().unwrap() as usize;
        assert_eq!(declared, output.blob.len());

        // BIN chunk holds the blob plus zero padding
        let bin = chunks.bin.unwrap();
        assert_eq!(&bin[..output.blob.len()], &output.blob[..]);
        assert!(bin.len() - output.blob.len() < 4);

        // GLB buffer entry has no uri
        assert!(parsed["buffers"][0].get("uri").is_none());
    }

    #[test]
    fn test_glb_parses_back_into_document() {
        let doc = document(vec![object("Quad", ObjectKind::Mesh(quad_mesh()))]);
        let output = convert(&doc);

        let container = output.glb_bytes().unwrap();
        let chunks = glb::read(&container).unwrap();
        let parsed: sceneforge_export::gltf::Gltf =
            serde_json::from_slice(&chunks.json).unwrap();

        assert_eq!(parsed.asset.version, "2.0");
        assert_eq!(parsed.nodes.len(), output.document.nodes.len());
        let primitive: &Primitive = &parsed.meshes[0].primitives[0];
        assert!(primitive.attributes.contains_key("POSITION"));
    }

    #[test]
    fn test_index_component_type() {
        let doc = document(vec![object("Quad", ObjectKind::Mesh(quad_mesh()))]);
        let output = convert(&doc);

        let indices = output.document.meshes[0].primitives[0].indices;
        let accessor = &output.document.accessors[indices];
        assert_eq!(accessor.component_type, COMPONENT_TYPE_UNSIGNED_SHORT);
        assert_eq!(accessor.accessor_type, "SCALAR");
    }
}
