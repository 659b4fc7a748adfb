//! Animation host: clip library, timeline state and pose evaluation
//!
//! The sampler only talks to `AnimationHost`. `SceneHost` is the in-crate
//! implementation over a `Scene` plus keyframed clips loaded from glTF.

use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;

use crate::error::AnimationError;
use crate::scene::{Armature, ObjectId, Scene};

/// Keyframe interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
}

/// Keyframed channel with times in (fractional) frames
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: Interpolation,
}

impl<T: Copy> Keyframes<T> {
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    fn sample(&self, frame: f32, lerp: impl Fn(T, T, f32) -> T) -> Option<T> {
        let len = self.times.len().min(self.values.len());
        if len == 0 {
            return None;
        }
        if frame <= self.times[0] {
            return Some(self.values[0]);
        }

        // Last key at or before `frame`
        let i = self.times[..len].partition_point(|&t| t <= frame) - 1;
        if i >= len - 1 {
            return Some(self.values[len - 1]);
        }

        let (t0, t1) = (self.times[i], self.times[i + 1]);
        match self.interpolation {
            Interpolation::Step => Some(self.values[i]),
            Interpolation::Linear => {
                let factor = if t1 > t0 { (frame - t0) / (t1 - t0) } else { 0.0 };
                Some(lerp(self.values[i], self.values[i + 1], factor.clamp(0.0, 1.0)))
            }
        }
    }

    /// First and last key time
    pub fn time_range(&self) -> Option<(f32, f32)> {
        Some((*self.times.first()?, *self.times.last()?))
    }
}

/// Local TRS channels of one bone. Missing channels keep the rest value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    pub translation: Option<Keyframes<Vec3>>,
    pub rotation: Option<Keyframes<Quat>>,
    pub scale: Option<Keyframes<Vec3>>,
}

impl BoneTrack {
    /// Evaluate this track over the bone's parent-relative rest matrix
    pub fn evaluate(&self, frame: f32, rest_local: Mat4) -> Mat4 {
        let (rest_scale, rest_rotation, rest_translation) = rest_local.to_scale_rotation_translation();

        let translation = self
            .translation
            .as_ref()
            .and_then(|k| k.sample(frame, Vec3::lerp))
            .unwrap_or(rest_translation);
        let rotation = self
            .rotation
            .as_ref()
            .and_then(|k| k.sample(frame, Quat::slerp))
            .unwrap_or(rest_rotation);
        let scale = self
            .scale
            .as_ref()
            .and_then(|k| k.sample(frame, Vec3::lerp))
            .unwrap_or(rest_scale);

        Mat4::from_scale_rotation_translation(scale, rotation.normalize(), translation)
    }

    fn time_range(&self) -> Option<(f32, f32)> {
        [
            self.translation.as_ref().and_then(Keyframes::time_range),
            self.rotation.as_ref().and_then(Keyframes::time_range),
            self.scale.as_ref().and_then(Keyframes::time_range),
        ]
        .into_iter()
        .flatten()
        .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
    }
}

/// A named animation clip (an "action") with per-bone tracks keyed by bone name
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub name: String,
    /// Inclusive frame range
    pub frame_range: (i32, i32),
    pub tracks: HashMap<String, BoneTrack>,
}

impl Clip {
    pub fn new(name: impl Into<String>, frame_range: (i32, i32)) -> Self {
        Self {
            name: name.into(),
            frame_range,
            tracks: HashMap::new(),
        }
    }

    pub fn with_track(mut self, bone: impl Into<String>, track: BoneTrack) -> Self {
        self.tracks.insert(bone.into(), track);
        self
    }

    /// `[floor(first key), ceil(last key)]` over every track, if any has keys
    pub fn key_range(&self) -> Option<(i32, i32)> {
        self.tracks
            .values()
            .filter_map(BoneTrack::time_range)
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
            .map(|(first, last)| (first.floor() as i32, last.ceil() as i32))
    }
}

/// What the sampler needs from the application owning the scene
pub trait AnimationHost {
    fn scene(&self) -> &Scene;

    fn clips(&self) -> &[Clip];

    fn clip_index(&self, name: &str) -> Option<usize> {
        self.clips().iter().position(|c| c.name == name)
    }

    fn current_frame(&self) -> i32;

    fn set_current_frame(&mut self, frame: i32);

    /// Clip currently assigned to `armature`, as an index into `clips()`
    fn active_clip(&self, armature: ObjectId) -> Option<usize>;

    fn set_active_clip(&mut self, armature: ObjectId, clip: Option<usize>);

    /// Armature-space bone matrices of `armature` at the current frame with its
    /// active clip applied, indexed like `Armature::bones`
    fn posed_matrices(&self, armature: ObjectId) -> Result<Vec<Mat4>, AnimationError>;
}

/// `AnimationHost` over an in-memory scene and clip library
#[derive(Debug, Clone, Default)]
pub struct SceneHost {
    pub scene: Scene,
    pub clips: Vec<Clip>,
    frame: i32,
    active: HashMap<ObjectId, usize>,
}

impl SceneHost {
    pub fn new(scene: Scene, clips: Vec<Clip>) -> Self {
        let frame = scene.frame_range.0;
        Self {
            scene,
            clips,
            frame,
            active: HashMap::new(),
        }
    }
}

/// Compose parent-relative matrices down the bone hierarchy
pub fn compose_hierarchy(armature: &Armature, locals: &[Mat4]) -> Vec<Mat4> {
    let bones = &armature.bones;
    let n = bones.len();
    let mut world: Vec<Option<Mat4>> = vec![None; n];

    for i in 0..n {
        // Collect unresolved ancestors, bounded so a parent cycle cannot spin
        let mut chain = Vec::new();
        let mut cursor = Some(i);
        while let Some(b) = cursor {
            if world[b].is_some() || chain.len() > n {
                break;
            }
            chain.push(b);
            cursor = bones[b].parent.filter(|&p| p < n);
        }

        for &b in chain.iter().rev() {
            let parent = bones[b].parent.and_then(|p| world.get(p).copied().flatten());
            world[b] = Some(match parent {
                Some(parent) => parent * locals[b],
                None => locals[b],
            });
        }
    }

    world
        .into_iter()
        .map(|m| m.unwrap_or(Mat4::IDENTITY))
        .collect()
}

impl AnimationHost for SceneHost {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn clips(&self) -> &[Clip] {
        &self.clips
    }

    fn current_frame(&self) -> i32 {
        self.frame
    }

    fn set_current_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    fn active_clip(&self, armature: ObjectId) -> Option<usize> {
        self.active.get(&armature).copied()
    }

    fn set_active_clip(&mut self, armature: ObjectId, clip: Option<usize>) {
        match clip {
            Some(clip) => {
                self.active.insert(armature, clip);
            }
            None => {
                self.active.remove(&armature);
            }
        }
    }

    fn posed_matrices(&self, armature_id: ObjectId) -> Result<Vec<Mat4>, AnimationError> {
        let armature = self.scene.armature(armature_id).ok_or_else(|| {
            AnimationError::NotAnArmature(
                self.scene
                    .object(armature_id)
                    .map_or_else(|| format!("#{armature_id}"), |o| o.name.clone()),
            )
        })?;

        let mut locals = armature.rest_locals();
        if let Some(clip) = self.active_clip(armature_id).and_then(|i| self.clips.get(i)) {
            let frame = self.frame as f32;
            for (local, bone) in locals.iter_mut().zip(&armature.bones) {
                if let Some(track) = clip.tracks.get(&bone.name) {
                    *local = track.evaluate(frame, *local);
                }
            }
        }

        Ok(compose_hierarchy(armature, &locals))
    }
}
