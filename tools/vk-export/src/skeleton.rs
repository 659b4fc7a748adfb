//! Skeleton flattening (bone tree -> joint array)
//!
//! Joints are numbered in pre-order depth-first order starting at the single
//! deform root, so every parent index is lower than its child's. Only deform
//! bones are visited; a non-deform bone hides its whole subtree.

use glam::Mat4;
use hashbrown::HashMap;

use crate::error::SkeletonError;
use crate::formats::{ArmatureJoint, MAX_MESH_JOINTS};
use crate::scene::Armature;
use crate::transform::{LocalTrs, TransformPipeline};

/// One visited bone in joint order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointSlot {
    /// Index into `Armature::bones`
    pub bone: usize,
    /// Parent joint index, `None` for the root
    pub parent_joint: Option<usize>,
}

/// Joint ordering of one armature. Shared by mesh skinning and animation sampling
/// so joint ids agree between `.mesh` and `.anim` files.
#[derive(Debug, Clone, Default)]
pub struct JointMap {
    slots: Vec<JointSlot>,
    names: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl JointMap {
    /// Walk the deform hierarchy of `armature`
    pub fn build(armature: &Armature) -> Result<Self, SkeletonError> {
        let bone_count = armature.bones.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); bone_count];
        let mut root: Option<usize> = None;

        for (i, bone) in armature.bones.iter().enumerate() {
            match bone.parent {
                Some(parent) if parent >= bone_count => {
                    return Err(SkeletonError::InvalidParent { bone: i, parent });
                }
                Some(parent) => {
                    if bone.deform {
                        children[parent].push(i);
                    }
                }
                None if bone.deform => {
                    if let Some(first) = root {
                        return Err(SkeletonError::MultipleRootBones {
                            first: armature.bones[first].name.clone(),
                            second: bone.name.clone(),
                        });
                    }
                    root = Some(i);
                }
                None => {}
            }
        }

        let root = root.ok_or(SkeletonError::NoRootBone)?;

        let mut map = Self::default();
        let mut stack = vec![JointSlot {
            bone: root,
            parent_joint: None,
        }];

        while let Some(slot) = stack.pop() {
            let joint = map.slots.len();
            if joint >= MAX_MESH_JOINTS {
                return Err(SkeletonError::TooManyJoints(joint + 1 + stack.len()));
            }

            let name = &armature.bones[slot.bone].name;
            if map.by_name.insert(name.clone(), joint).is_some() {
                return Err(SkeletonError::DuplicateBoneName(name.clone()));
            }
            map.names.push(name.clone());
            map.slots.push(slot);

            // Reverse so the first child in array order is popped first
            for &child in children[slot.bone].iter().rev() {
                stack.push(JointSlot {
                    bone: child,
                    parent_joint: Some(joint),
                });
            }
        }

        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[JointSlot] {
        &self.slots
    }

    /// Joint names in index order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn joint_id(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Parent-relative TRS for every joint given armature-space bone matrices
    /// (rest or posed), indexed like `Armature::bones`. `bone_matrices` must
    /// hold one matrix per bone.
    pub fn local_transforms(
        &self,
        bone_matrices: &[Mat4],
        pipeline: &TransformPipeline,
    ) -> Vec<LocalTrs> {
        self.slots
            .iter()
            .map(|slot| {
                let parent = slot
                    .parent_joint
                    .map(|p| bone_matrices[self.slots[p].bone]);
                pipeline.local_trs(bone_matrices[slot.bone], parent)
            })
            .collect()
    }
}

/// Flattened skeleton ready to be stored in a skinned mesh
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub map: JointMap,
    pub joints: Vec<ArmatureJoint>,
}

/// Flatten `armature`'s rest pose into joints expressed through `pipeline`
pub fn flatten(armature: &Armature, pipeline: &TransformPipeline) -> Result<Skeleton, SkeletonError> {
    let map = JointMap::build(armature)?;
    let rest: Vec<Mat4> = armature.bones.iter().map(|b| b.rest).collect();

    let joints = map
        .local_transforms(&rest, pipeline)
        .into_iter()
        .zip(map.slots())
        .zip(map.names())
        .map(|((local, slot), name)| ArmatureJoint {
            name: name.clone(),
            parent_index: slot.parent_joint.map_or(-1, |p| p as i16),
            local_position: local.position_array(),
            local_orientation: local.orientation_array(),
            local_scale: local.scale_array(),
        })
        .collect();

    Ok(Skeleton { map, joints })
}
