//! Sampled armature animation format (.anim)
//!
//! # Layout
//! ```text
//! magic        "ARMATURE_ANIMATION" (no length, no terminator)
//! version      u32
//! pose_count   u32
//! joint_count  u32
//! names        joint_count × NUL-terminated UTF-8, in joint index order
//! poses        pose_count × joint_count × { local_pos 3×f32,
//!                                           local_orient 4×f32 (xyzw),
//!                                           local_scale 3×f32 }
//! ```
//!
//! Poses are stored frame-major: `[pose0_joint0, pose0_joint1, ..., pose1_joint0, ...]`.

use super::reader::{ByteReader, DecodeError};
use crate::VK_ASSET_FORMAT;

/// Size of one joint sample in bytes (10 floats)
pub const ANIMATION_POSE_JOINT_SIZE: usize = 40;

/// Local TRS of one joint at one sampled frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    pub local_position: [f32; 3],
    /// Unit quaternion [x, y, z, w]
    pub local_orientation: [f32; 4],
    pub local_scale: [f32; 3],
}

impl Default for JointSample {
    fn default() -> Self {
        Self {
            local_position: [0.0, 0.0, 0.0],
            local_orientation: [0.0, 0.0, 0.0, 1.0], // Identity quaternion
            local_scale: [1.0, 1.0, 1.0],
        }
    }
}

/// Every joint's sample at one frame, indexed like the clip's joint list
#[derive(Debug, Clone, PartialEq)]
pub struct ArmaturePose {
    pub joints: Vec<JointSample>,
}

impl ArmaturePose {
    /// A pose with `joint_count` identity samples
    pub fn identity(joint_count: usize) -> Self {
        Self {
            joints: vec![JointSample::default(); joint_count],
        }
    }
}

/// A clip sampled at fixed frame intervals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledAnimation {
    /// Clip name. Not stored in the file; the file stem carries it.
    pub name: String,
    /// Joint names in index order; this is the authoritative joint ordering
    pub joint_names: Vec<String>,
    pub poses: Vec<ArmaturePose>,
}

impl SampledAnimation {
    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }

    /// Index of the joint called `name`
    pub fn joint_id(&self, name: &str) -> Option<usize> {
        self.joint_names.iter().position(|n| n == name)
    }
}

/// Fixed-size part of an animation file following the magic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationHeader {
    pub version: u32,
    pub pose_count: u32,
    pub joint_count: u32,
}

impl AnimationHeader {
    pub const SIZE: usize = 18 + 12;

    pub fn new(pose_count: u32, joint_count: u32) -> Self {
        Self {
            version: VK_ASSET_FORMAT.version,
            pose_count,
            joint_count,
        }
    }

    /// Size of the pose block that follows the joint names, or `None` if it
    /// does not fit in a `usize`
    pub fn pose_data_size(&self) -> Option<usize> {
        (self.pose_count as usize)
            .checked_mul(self.joint_count as usize)?
            .checked_mul(ANIMATION_POSE_JOINT_SIZE)
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..18].copy_from_slice(VK_ASSET_FORMAT.animation_magic);
        bytes[18..22].copy_from_slice(&self.version.to_le_bytes());
        bytes[22..26].copy_from_slice(&self.pose_count.to_le_bytes());
        bytes[26..30].copy_from_slice(&self.joint_count.to_le_bytes());
        bytes
    }

    /// Read header from the start of an animation file
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        r.expect_magic(VK_ASSET_FORMAT.animation_magic, "ARMATURE_ANIMATION")?;
        Ok(Self {
            version: r.expect_version()?,
            pose_count: r.read_u32()?,
            joint_count: r.read_u32()?,
        })
    }
}

/// Decode a complete `.anim` file.
pub fn read_animation(bytes: &[u8]) -> Result<SampledAnimation, DecodeError> {
    let mut r = ByteReader::new(bytes);
    let header = AnimationHeader::read(&mut r)?;

    // Empty poses occupy no bytes, so nothing bounds their count
    if header.joint_count == 0 && header.pose_count > 0 {
        return Err(DecodeError::PosesWithoutJoints(header.pose_count));
    }

    let mut anim = SampledAnimation::default();
    for _ in 0..header.joint_count {
        anim.joint_names.push(r.read_cstr()?);
    }

    let needed = header.pose_data_size().unwrap_or(usize::MAX);
    if r.remaining() < needed {
        return Err(DecodeError::UnexpectedEof {
            offset: r.position(),
            needed: needed - r.remaining(),
        });
    }

    anim.poses.reserve(header.pose_count as usize);
    for _ in 0..header.pose_count {
        let mut pose = ArmaturePose::identity(0);
        for _ in 0..header.joint_count {
            pose.joints.push(JointSample {
                local_position: r.read_f32s()?,
                local_orientation: r.read_f32s()?,
                local_scale: r.read_f32s()?,
            });
        }
        anim.poses.push(pose);
    }

    r.finish()?;
    Ok(anim)
}
