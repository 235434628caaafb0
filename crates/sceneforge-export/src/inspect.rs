//! glTF document inspection
//!
//! Renders a converted document as an indented node tree with per-node
//! markers: `R` scene root, `N` plain node, `S` skeleton (a child
//! carries a skin), `J` joint, plus `<RST>` transform flags and one
//! `[A]` line per animation with its baked frame count.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::gltf::{glb, Gltf, GltfResult};

/// Load a `.gltf` or `.glb` document from disk
pub fn load_document(path: &Path) -> GltfResult<Gltf> {
    let data = fs::read(path)?;
    let is_glb = path
        .extension()
        .map_or(false, |ext| ext == "glb" || ext == "vrm");

    let json = if is_glb { glb::read(&data)?.json } else { data };
    Ok(serde_json::from_slice(&json)?)
}

/// Render the document's node tree and animation list
pub fn render(document: &Gltf) -> String {
    let mut out = String::new();

    let scene = document.scene.and_then(|i| document.scenes.get(i));
    if let Some(scene) = scene {
        let _ = writeln!(out, " [R] {}", scene.name.as_deref().unwrap_or(""));
        for &node_id in &scene.nodes {
            render_node(document, node_id, None, 1, &mut out);
        }
    }

    for animation in &document.animations {
        let frames = animation
            .samplers
            .first()
            .and_then(|s| document.accessors.get(s.input))
            .map(|a| a.count);
        let name = animation.name.as_deref().unwrap_or("");
        match frames {
            Some(frames) => {
                let _ = writeln!(out, " [A] {name} {{{frames} frames}}");
            }
            None => {
                let _ = writeln!(out, " [A] {name}");
            }
        }
    }

    out
}

fn render_node(
    document: &Gltf,
    node_id: usize,
    joints: Option<&[usize]>,
    indent: usize,
    out: &mut String,
) {
    let node = &document.nodes[node_id];

    let mut extra = String::new();
    let mut matrix = String::new();
    if node.rotation.is_some() {
        matrix.push('R');
    }
    if node.scale.is_some() {
        matrix.push('S');
    }
    if node.translation.is_some() {
        matrix.push('T');
    }
    if !matrix.is_empty() {
        let _ = write!(extra, " <{matrix}>");
    }

    let mut marker = 'N';
    if joints.is_some_and(|j| j.contains(&node_id)) {
        marker = 'J';
    } else if let Some(skin_id) = node.skin {
        let skin = &document.skins[skin_id];
        let _ = write!(
            extra,
            " {{skin: {} ({} joints)",
            skin.name.as_deref().unwrap_or(""),
            skin.joints.len()
        );
        if let Some(mesh_id) = node.mesh {
            let _ = write!(
                extra,
                ", mesh: {}",
                document.meshes[mesh_id].name.as_deref().unwrap_or("")
            );
        }
        extra.push('}');
    }

    // a skinned child makes this node the skeleton root; its joints
    // mark the bone subtree below
    let mut child_joints = joints;
    for &child in &node.children {
        if let Some(skin_id) = document.nodes[child].skin {
            marker = 'S';
            child_joints = Some(&document.skins[skin_id].joints);
        }
    }

    let mut lead = String::new();
    for i in 0..indent {
        lead.push_str(if i < indent - 1 { "  |" } else { "  +" });
    }
    let _ = writeln!(
        out,
        "{lead} [{marker}] {}{extra}",
        node.name.as_deref().unwrap_or("")
    );

    for &child in &node.children {
        render_node(document, child, child_joints, indent + 1, out);
    }
}
