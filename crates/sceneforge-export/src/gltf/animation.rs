//! Animation sampling
//!
//! Bakes an action into glTF animation channels by stepping the
//! document's frame pointer through the clip and writing the posed
//! joint transforms at every visited frame. One SCALAR input channel
//! carries a single entry per frame, shared by every sampler.

use std::collections::HashMap;
use std::fmt;

use glam::Mat4;
use tracing::debug;

use sceneforge_core::{quat_to_array, Transform};
use sceneforge_scene::{Action, Armature, FrameGuard, FrameState};

use super::buffer::{ComponentType, ElementType, GltfBuffer};
use super::{Animation, AnimationChannel, AnimationSamplerDef, AnimationTarget, Gltf};

/// Playback speed: frames advanced per output sample
pub enum SpeedScale {
    Fixed(f32),
    /// Evaluated at each integer frame, for clips with variable pacing
    PerFrame(Box<dyn Fn(i32) -> f32>),
}

impl SpeedScale {
    pub fn at(&self, frame: i32) -> f32 {
        match self {
            SpeedScale::Fixed(scale) => *scale,
            SpeedScale::PerFrame(f) => f(frame),
        }
    }
}

impl Default for SpeedScale {
    fn default() -> Self {
        SpeedScale::Fixed(1.0)
    }
}

impl From<f32> for SpeedScale {
    fn from(scale: f32) -> Self {
        SpeedScale::Fixed(scale)
    }
}

impl fmt::Debug for SpeedScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedScale::Fixed(scale) => f.debug_tuple("Fixed").field(scale).finish(),
            SpeedScale::PerFrame(_) => f.debug_tuple("PerFrame").finish(),
        }
    }
}

/// TRS output channels for one joint
struct JointChannels {
    rotation: usize,
    scale: usize,
    translation: usize,
}

/// Bakes actions into animations over the shared buffer
pub struct AnimationSampler<'a> {
    buffer: &'a mut GltfBuffer,
    speed_scale: &'a SpeedScale,
}

impl<'a> AnimationSampler<'a> {
    pub fn new(buffer: &'a mut GltfBuffer, speed_scale: &'a SpeedScale) -> Self {
        Self { buffer, speed_scale }
    }

    /// Bake `action` for `armature` into a new animation on `root`.
    ///
    /// Every bone gets rotation, scale and translation channels whether
    /// or not it has curves; bones without keys bake at rest. A bone
    /// whose node is missing from the document keeps its channels but
    /// leaves the target node unset.
    ///
    /// The frame pointer moves through a [`FrameGuard`], so the
    /// document is back on its original frame when this returns.
    pub fn make_action(
        &mut self,
        root: &mut Gltf,
        armature: &Armature,
        armature_world: &Mat4,
        action: &Action,
        frame_state: &FrameState,
    ) {
        let input = self
            .buffer
            .add_channel(ComponentType::Float, ElementType::Scalar);

        let mut animation = Animation {
            name: Some(action.name.clone()),
            channels: Vec::new(),
            samplers: Vec::new(),
        };

        let bone_order = armature.sorted_bone_indices();
        let mut outputs: HashMap<usize, JointChannels> = HashMap::new();

        for &bone_index in &bone_order {
            let bone = &armature.bones[bone_index];
            let node = root.find_node(&bone.name);

            let mut add = |path: &str, element: ElementType, buffer: &mut GltfBuffer| {
                let output = buffer.add_channel(ComponentType::Float, element);
                animation.samplers.push(AnimationSamplerDef {
                    interpolation: "LINEAR".to_string(),
                    input,
                    output,
                });
                animation.channels.push(AnimationChannel {
                    sampler: animation.samplers.len() - 1,
                    target: AnimationTarget {
                        node,
                        path: path.to_string(),
                    },
                });
                output
            };

            let channels = JointChannels {
                rotation: add("rotation", ElementType::Vec4, self.buffer),
                scale: add("scale", ElementType::Vec3, self.buffer),
                translation: add("translation", ElementType::Vec3, self.buffer),
            };
            outputs.insert(bone_index, channels);
        }

        let guard = FrameGuard::new(frame_state);

        let mut frame = action.frame_start;
        let mut frame_int: Option<i32> = None;
        let mut sample = 0u32;
        while frame <= action.frame_end {
            let floor = frame.floor() as i32;
            if frame_int != Some(floor) {
                frame_int = Some(floor);
                guard.set_frame(floor);
            }

            let step = self.speed_scale.at(floor);
            if step != 1.0 {
                guard.set_subframe(frame - floor as f32);
            }

            self.buffer.write(input, &[sample as f32]);
            self.write_pose(armature, armature_world, action, &bone_order, &outputs, guard.state());

            frame += step;
            sample += 1;
        }

        debug!(
            action = action.name.as_str(),
            samples = sample,
            channels = animation.channels.len(),
            "baked action"
        );

        root.animations.push(animation);
    }

    /// Write every joint's posed TRS at the current frame.
    ///
    /// The joint-local pose is the parent-relative rest matrix composed
    /// with the sampled basis; root bones fold in the armature world
    /// matrix, matching how the joints were attached.
    fn write_pose(
        &mut self,
        armature: &Armature,
        armature_world: &Mat4,
        action: &Action,
        bone_order: &[usize],
        outputs: &HashMap<usize, JointChannels>,
        frame_state: &FrameState,
    ) {
        for &bone_index in bone_order {
            let bone = &armature.bones[bone_index];
            let basis = action.sample_basis(&bone.name, frame_state.floating_frame());

            let mut local = armature.rest_relative(bone_index) * basis.to_matrix();
            if bone.parent.is_none() {
                local = *armature_world * local;
            }
            let pose = Transform::from_matrix(&local);

            let channels = &outputs[&bone_index];
            self.buffer
                .write(channels.rotation, &quat_to_array(pose.rotation));
            self.buffer.write(channels.scale, &pose.scale.to_array());
            self.buffer
                .write(channels.translation, &pose.translation.to_array());
        }
    }
}
