//! Transform composition shared by mesh, skeleton and animation export
//!
//! Every exported record goes through the same chain:
//! `transform = external · object_world (optional) · conversion`.
//! Bone matrices additionally get the scale fixup on the right so the reflection
//! cancels between parent and child when the local transform is taken.

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::coords::CoordinateSystem;

/// Parent-relative transform of one joint, decomposed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTrs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTrs {
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn position_array(&self) -> [f32; 3] {
        self.translation.to_array()
    }

    /// Quaternion as `[x, y, z, w]`
    pub fn orientation_array(&self) -> [f32; 4] {
        self.rotation.to_array()
    }

    pub fn scale_array(&self) -> [f32; 3] {
        self.scale.to_array()
    }
}

/// The composed export transform for one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPipeline {
    transform: Mat4,
    normal: Mat3,
    scale_fixup: Mat4,
}

impl TransformPipeline {
    /// Compose `external · object_world · conversion`. Pass `None` for
    /// `object_world` when object transforms are not applied.
    pub fn new(external: Mat4, object_world: Option<Mat4>, coords: &CoordinateSystem) -> Self {
        let mut transform = external;
        if let Some(world) = object_world {
            transform *= world;
        }
        transform *= coords.conversion_matrix();

        Self {
            transform,
            normal: Mat3::from_mat4(transform).inverse().transpose(),
            scale_fixup: Mat4::from_mat3(coords.scale_matrix()),
        }
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Inverse-transpose of the linear part, for normals and tangents
    pub fn normal_matrix(&self) -> Mat3 {
        self.normal
    }

    pub fn scale_fixup(&self) -> Mat4 {
        self.scale_fixup
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.transform.transform_point3(p)
    }

    /// Covector transform. The result is not renormalised.
    pub fn transform_normal(&self, n: Vec3) -> Vec3 {
        self.normal * n
    }

    /// Bring an armature-space bone matrix into export space
    pub fn bone_space(&self, bone: Mat4) -> Mat4 {
        self.transform * bone * self.scale_fixup
    }

    /// Local TRS of `bone` relative to `parent` (both armature-space). Roots
    /// pass `None` and get their export-space transform directly.
    pub fn local_trs(&self, bone: Mat4, parent: Option<Mat4>) -> LocalTrs {
        let bone = self.bone_space(bone);
        let local = match parent {
            Some(parent) => self.bone_space(parent).inverse() * bone,
            None => bone,
        };
        LocalTrs::from_matrix(local)
    }
}
