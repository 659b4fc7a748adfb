//! Binary format writers for Vk-Engine asset files
//!
//! Layouts and decoders live in vk-common; this module encodes converted meshes
//! and sampled animations and writes them to disk.

pub use vk_common::formats::*;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Largest joint count a skinned mesh can declare (stored as i16)
pub const MAX_MESH_JOINTS: usize = i16::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("joint name '{0}' contains a NUL byte")]
    NameContainsNul(String),

    #[error("skinned mesh has {0} joints, which does not fit in an i16 count")]
    TooManyJoints(usize),

    #[error("{what} count {count} does not fit in a u32")]
    CountOverflow { what: &'static str, count: usize },

    #[error("animation has {0} poses but no joints")]
    PosesWithoutJoints(usize),

    #[error("pose {pose} has {found} joint samples, expected {expected}")]
    PoseJointMismatch {
        pose: usize,
        found: usize,
        expected: usize,
    },
}

fn count_u32(what: &'static str, count: usize) -> Result<u32, EncodeError> {
    u32::try_from(count).map_err(|_| EncodeError::CountOverflow { what, count })
}

fn write_f32s<W: Write>(w: &mut W, values: &[f32]) -> Result<(), EncodeError> {
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn write_name<W: Write>(w: &mut W, name: &str) -> Result<(), EncodeError> {
    if name.as_bytes().contains(&0) {
        return Err(EncodeError::NameContainsNul(name.to_string()));
    }
    w.write_all(name.as_bytes())?;
    w.write_all(&[0])?;
    Ok(())
}

fn write_mesh_body<W: Write>(w: &mut W, mesh: &Mesh, kind: MeshKind) -> Result<(), EncodeError> {
    let header = MeshHeader::new(
        kind,
        mesh.flags(),
        count_u32("vertex", mesh.verts.len())?,
        count_u32("triangle", mesh.tris.len())?,
    );
    w.write_all(&header.to_bytes())?;

    for v in &mesh.verts {
        write_f32s(w, &v.position)?;
        write_f32s(w, &v.normal)?;
        write_f32s(w, &v.tangent)?;
        write_f32s(w, &v.tex_coords)?;
        if kind == MeshKind::Skinned {
            for id in v.joint_ids {
                w.write_all(&id.to_le_bytes())?;
            }
            write_f32s(w, &v.joint_weights)?;
        }
    }

    for tri in &mesh.tris {
        for i in tri {
            w.write_all(&i.to_le_bytes())?;
        }
    }

    Ok(())
}

/// Write a STATIC_MESH file. Joint data on the mesh is ignored.
pub fn write_static_mesh<W: Write>(w: &mut W, mesh: &Mesh) -> Result<(), EncodeError> {
    if !mesh.joints.is_empty() {
        tracing::warn!(
            "Encoding a mesh with {} joints as STATIC_MESH, skinning data is dropped",
            mesh.joints.len()
        );
    }
    write_mesh_body(w, mesh, MeshKind::Static)
}

/// Write a SKINNED_MESH file: vertices with joint influences followed by the skeleton
pub fn write_skinned_mesh<W: Write>(w: &mut W, mesh: &Mesh) -> Result<(), EncodeError> {
    if mesh.joints.len() > MAX_MESH_JOINTS {
        return Err(EncodeError::TooManyJoints(mesh.joints.len()));
    }
    write_mesh_body(w, mesh, MeshKind::Skinned)?;

    w.write_all(&(mesh.joints.len() as i16).to_le_bytes())?;
    for joint in &mesh.joints {
        write_name(w, &joint.name)?;
        write_f32s(w, &joint.local_position)?;
        write_f32s(w, &joint.local_orientation)?;
        write_f32s(w, &joint.local_scale)?;
        w.write_all(&joint.parent_index.to_le_bytes())?;
    }

    Ok(())
}

/// Write a mesh in whichever layout its joints call for
pub fn write_mesh<W: Write>(w: &mut W, mesh: &Mesh) -> Result<(), EncodeError> {
    match mesh.kind() {
        MeshKind::Static => write_static_mesh(w, mesh),
        MeshKind::Skinned => write_skinned_mesh(w, mesh),
    }
}

/// Write an ARMATURE_ANIMATION file
///
/// Every pose must carry one sample per joint name; short or long poses are
/// rejected as a count mismatch rather than silently padded.
pub fn write_animation<W: Write>(w: &mut W, anim: &SampledAnimation) -> Result<(), EncodeError> {
    if anim.joint_count() == 0 && !anim.poses.is_empty() {
        return Err(EncodeError::PosesWithoutJoints(anim.poses.len()));
    }
    let joint_count = count_u32("joint", anim.joint_count())?;
    let header = AnimationHeader::new(count_u32("pose", anim.poses.len())?, joint_count);
    w.write_all(&header.to_bytes())?;

    for name in &anim.joint_names {
        write_name(w, name)?;
    }

    for (i, pose) in anim.poses.iter().enumerate() {
        if pose.joints.len() != anim.joint_count() {
            return Err(EncodeError::PoseJointMismatch {
                pose: i,
                found: pose.joints.len(),
                expected: anim.joint_count(),
            });
        }
        for sample in &pose.joints {
            write_f32s(w, &sample.local_position)?;
            write_f32s(w, &sample.local_orientation)?;
            write_f32s(w, &sample.local_scale)?;
        }
    }

    Ok(())
}

/// Encode in memory, then write to `<path>.tmp` and rename into place so a
/// failed write never leaves a truncated file under the final name.
pub fn write_asset_file<F>(path: &Path, encode: F) -> Result<usize, crate::ExportError>
where
    F: FnOnce(&mut Vec<u8>) -> Result<(), EncodeError>,
{
    let mut bytes = Vec::new();
    encode(&mut bytes)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| crate::ExportError::io(parent, e))?;
    }

    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, &bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(crate::ExportError::io(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(crate::ExportError::io(path, e));
    }

    Ok(bytes.len())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
