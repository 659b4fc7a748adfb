//! Animation sampling (host clip -> sampled joint poses)
//!
//! A clip is baked by stepping the host timeline through the requested frames
//! and reading the posed armature at each one. The host's frame and the
//! armature's active clip are restored afterwards, whatever the outcome.

pub mod host;

use std::ops::{Deref, DerefMut};

use glam::Mat4;

pub use host::{AnimationHost, BoneTrack, Clip, Interpolation, Keyframes, SceneHost};

use crate::coords::CoordinateSystem;
use crate::error::{AnimationError, ConfigError, ExportError};
use crate::formats::{ArmaturePose, JointSample, SampledAnimation};
use crate::scene::ObjectId;
use crate::skeleton::JointMap;
use crate::transform::TransformPipeline;

/// Where a clip's sampled frame range comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameRangeSource {
    /// The clip's own range
    #[default]
    Clip,
    /// The scene's range, shared by every clip
    Scene,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOptions {
    pub frame_step: i32,
    pub apply_object_transform: bool,
    /// Composed in front of everything else
    pub external: Mat4,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            frame_step: 1,
            apply_object_transform: false,
            external: Mat4::IDENTITY,
        }
    }
}

/// Frames sampled for `[begin, end]` at `step`.
///
/// Starts at `begin` and runs up to and including the first frame at or past
/// `end`, so the last sample may land beyond `end` when the range is not a
/// multiple of `step`.
pub fn frame_numbers(begin: i32, end: i32, step: i32) -> Result<Vec<i32>, ExportError> {
    if step < 1 {
        return Err(ConfigError::InvalidFrameStep(step).into());
    }
    if end < begin {
        return Err(AnimationError::InvalidFrameRange { begin, end }.into());
    }

    let span = end as i64 - begin as i64;
    let step = step as i64;
    let count = (span + step - 1) / step + 1;
    (0..count)
        .map(|i| {
            i32::try_from(begin as i64 + i * step)
                .map_err(|_| ExportError::from(AnimationError::InvalidFrameRange { begin, end }))
        })
        .collect()
}

/// Saves the host's current frame and an armature's active clip, restoring
/// both when dropped.
pub struct TimelineGuard<'a, H: AnimationHost + ?Sized> {
    host: &'a mut H,
    armature: ObjectId,
    saved_frame: i32,
    saved_clip: Option<usize>,
}

impl<'a, H: AnimationHost + ?Sized> TimelineGuard<'a, H> {
    pub fn new(host: &'a mut H, armature: ObjectId) -> Self {
        let saved_frame = host.current_frame();
        let saved_clip = host.active_clip(armature);
        Self {
            host,
            armature,
            saved_frame,
            saved_clip,
        }
    }
}

impl<H: AnimationHost + ?Sized> Deref for TimelineGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: AnimationHost + ?Sized> DerefMut for TimelineGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: AnimationHost + ?Sized> Drop for TimelineGuard<'_, H> {
    fn drop(&mut self) {
        self.host.set_active_clip(self.armature, self.saved_clip);
        self.host.set_current_frame(self.saved_frame);
    }
}

/// Bake clip `clip_name` on `armature` over `[begin, end]`.
///
/// Joint order matches the armature's flattened skeleton, so ids agree with
/// skinned meshes bound to the same armature.
pub fn sample_clip<H: AnimationHost + ?Sized>(
    host: &mut H,
    armature: ObjectId,
    clip_name: &str,
    (begin, end): (i32, i32),
    options: &SampleOptions,
    coords: &CoordinateSystem,
) -> Result<SampledAnimation, ExportError> {
    let frames = frame_numbers(begin, end, options.frame_step)?;

    let scene = host.scene();
    let object = scene
        .object(armature)
        .ok_or_else(|| AnimationError::NotAnArmature(format!("#{armature}")))?;
    let rig = scene
        .armature(armature)
        .ok_or_else(|| AnimationError::NotAnArmature(object.name.clone()))?;
    let clip = host
        .clip_index(clip_name)
        .ok_or_else(|| AnimationError::UnknownClip(clip_name.to_string()))?;

    let joints = JointMap::build(rig)?;
    let bone_count = rig.bones.len();
    let pipeline = TransformPipeline::new(
        options.external,
        options.apply_object_transform.then_some(object.world),
        coords,
    );

    let mut anim = SampledAnimation {
        name: clip_name.to_string(),
        joint_names: joints.names().to_vec(),
        poses: Vec::with_capacity(frames.len()),
    };

    let mut timeline = TimelineGuard::new(host, armature);
    timeline.set_active_clip(armature, Some(clip));

    for frame in frames {
        timeline.set_current_frame(frame);
        let matrices = timeline.posed_matrices(armature)?;
        if matrices.len() != bone_count {
            return Err(AnimationError::PoseSizeMismatch {
                expected: bone_count,
                got: matrices.len(),
            }
            .into());
        }

        let pose = ArmaturePose {
            joints: joints
                .local_transforms(&matrices, &pipeline)
                .into_iter()
                .map(|local| JointSample {
                    local_position: local.position_array(),
                    local_orientation: local.orientation_array(),
                    local_scale: local.scale_array(),
                })
                .collect(),
        };
        anim.poses.push(pose);
    }

    tracing::debug!(
        "Sampled clip '{}': {} poses x {} joints",
        clip_name,
        anim.poses.len(),
        anim.joint_count()
    );

    Ok(anim)
}
