//! Keyframed actions and the document frame pointer
//!
//! The frame pointer is process-wide mutable state on the document, the
//! way DCC tools expose it. [`FrameGuard`] scopes every change and puts
//! the original frame back on all exit paths, so a conversion can never
//! leave the document parked on an animation frame.

use std::cell::Cell;
use std::collections::HashMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use sceneforge_core::Transform;

/// One keyframe on a curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub frame: f32,
    pub value: T,
}

/// Basis (pose) transform curves for one bone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoneCurves {
    #[serde(default)]
    pub rotation: Vec<Keyframe<Quat>>,
    #[serde(default)]
    pub scale: Vec<Keyframe<Vec3>>,
    #[serde(default)]
    pub translation: Vec<Keyframe<Vec3>>,
}

/// A named animation clip with per-bone curves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub frame_start: f32,
    pub frame_end: f32,
    /// Bone name to curves
    #[serde(default)]
    pub curves: HashMap<String, BoneCurves>,
}

impl Action {
    /// Evaluate a bone's basis transform at a (possibly fractional) frame.
    ///
    /// Missing curves evaluate to the identity component, so a bone with
    /// no keys poses at rest.
    pub fn sample_basis(&self, bone_name: &str, frame: f32) -> Transform {
        let Some(curves) = self.curves.get(bone_name) else {
            return Transform::IDENTITY;
        };

        Transform {
            rotation: sample_quat(&curves.rotation, frame),
            scale: sample_vec3(&curves.scale, frame, Vec3::ONE),
            translation: sample_vec3(&curves.translation, frame, Vec3::ZERO),
        }
    }
}

/// Locate the keyframe pair straddling `frame` and the blend factor
fn bracket<T: Copy>(keys: &[Keyframe<T>], frame: f32) -> Option<(T, T, f32)> {
    let first = keys.first()?;
    if frame <= first.frame {
        return Some((first.value, first.value, 0.0));
    }
    let last = keys.last()?;
    if frame >= last.frame {
        return Some((last.value, last.value, 0.0));
    }

    let next = keys.iter().position(|k| k.frame >= frame)?;
    let a = &keys[next - 1];
    let b = &keys[next];
    let span = b.frame - a.frame;
    let t = if span > 0.0 { (frame - a.frame) / span } else { 0.0 };
    Some((a.value, b.value, t))
}

fn sample_vec3(keys: &[Keyframe<Vec3>], frame: f32, default: Vec3) -> Vec3 {
    match bracket(keys, frame) {
        Some((a, b, t)) => a.lerp(b, t),
        None => default,
    }
}

fn sample_quat(keys: &[Keyframe<Quat>], frame: f32) -> Quat {
    match bracket(keys, frame) {
        // lerp takes the short path (negates on negative dot) and normalizes
        Some((a, b, t)) => a.lerp(b, t).normalize(),
        None => Quat::IDENTITY,
    }
}

/// The document's current-frame pointer
#[derive(Debug, Default)]
pub struct FrameState {
    frame: Cell<i32>,
    subframe: Cell<f32>,
}

impl FrameState {
    /// Current integer frame
    pub fn frame(&self) -> i32 {
        self.frame.get()
    }

    /// Current fractional offset within the frame
    pub fn subframe(&self) -> f32 {
        self.subframe.get()
    }

    /// Frame and subframe combined
    pub fn floating_frame(&self) -> f32 {
        self.frame.get() as f32 + self.subframe.get()
    }
}

/// Scoped frame change; restores the previous frame on drop
pub struct FrameGuard<'a> {
    state: &'a FrameState,
    saved_frame: i32,
    saved_subframe: f32,
}

impl<'a> FrameGuard<'a> {
    pub fn new(state: &'a FrameState) -> Self {
        Self {
            state,
            saved_frame: state.frame(),
            saved_subframe: state.subframe(),
        }
    }

    /// Move the frame pointer, clearing the subframe
    pub fn set_frame(&self, frame: i32) {
        self.state.frame.set(frame);
        self.state.subframe.set(0.0);
    }

    /// Set the fractional offset within the current frame
    pub fn set_subframe(&self, subframe: f32) {
        self.state.subframe.set(subframe);
    }

    pub fn state(&self) -> &FrameState {
        self.state
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.state.frame.set(self.saved_frame);
        self.state.subframe.set(self.saved_subframe);
    }
}
