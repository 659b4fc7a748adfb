//! Static and skinned mesh formats (.mesh)
//!
//! # Layout
//! ```text
//! magic        "STATIC_MESH" | "SKINNED_MESH" (no length, no terminator)
//! version      u32
//! flags        u32  (bit 0 = tangents present)
//! vert_count   u32
//! tri_count    u32
//! vertices     vert_count × vertex
//! triangles    tri_count × [u32; 3]
//! ```
//!
//! A static vertex is `pos 3×f32, normal 3×f32, tangent 4×f32, uv 2×f32` (48 bytes).
//! A skinned vertex appends `joint_ids 4×i16, joint_weights 3×f32` (68 bytes).
//!
//! Skinned meshes are followed by the skeleton:
//! ```text
//! joint_count  i16
//! joints       joint_count × { name (UTF-8, NUL-terminated),
//!                              local_pos 3×f32, local_orient 4×f32 (xyzw),
//!                              local_scale 3×f32, parent_index i16 }
//! ```

use super::reader::{ByteReader, DecodeError};
use crate::VK_ASSET_FORMAT;

/// Flags bit: vertices carry exported tangents
pub const FLAG_TANGENTS: u32 = 0x1;

/// Size of one static vertex in bytes (12 floats)
pub const STATIC_VERTEX_SIZE: usize = 48;

/// Size of one skinned vertex in bytes (static + 4×i16 + 3×f32)
pub const SKINNED_VERTEX_SIZE: usize = STATIC_VERTEX_SIZE + 8 + 12;

/// Which of the two mesh layouts a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    Static,
    Skinned,
}

impl MeshKind {
    pub fn magic(self) -> &'static [u8] {
        match self {
            MeshKind::Static => VK_ASSET_FORMAT.static_mesh_magic,
            MeshKind::Skinned => VK_ASSET_FORMAT.skinned_mesh_magic,
        }
    }

    pub fn vertex_size(self) -> usize {
        match self {
            MeshKind::Static => STATIC_VERTEX_SIZE,
            MeshKind::Skinned => SKINNED_VERTEX_SIZE,
        }
    }
}

/// One welded vertex.
///
/// `joint_weights` holds the first three influences only; the fourth is implied
/// as `1 - sum` by the loader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// xyz = tangent, w = bitangent sign
    pub tangent: [f32; 4],
    pub tex_coords: [f32; 2],
    /// -1 marks an unused slot
    pub joint_ids: [i16; 4],
    pub joint_weights: [f32; 3],
}

impl Vertex {
    pub const NO_JOINTS: [i16; 4] = [-1; 4];
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            tangent: [0.0; 4],
            tex_coords: [0.0; 2],
            joint_ids: Self::NO_JOINTS,
            joint_weights: [0.0; 3],
        }
    }
}

/// One skeleton joint with its parent-relative rest transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmatureJoint {
    pub name: String,
    /// -1 for the root, otherwise lower than this joint's own index
    pub parent_index: i16,
    pub local_position: [f32; 3],
    /// Unit quaternion [x, y, z, w]
    pub local_orientation: [f32; 4],
    pub local_scale: [f32; 3],
}

/// A converted mesh. Static when `joints` is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub verts: Vec<Vertex>,
    pub tris: Vec<[u32; 3]>,
    pub joints: Vec<ArmatureJoint>,
    pub has_tangents: bool,
}

impl Mesh {
    pub fn new(has_tangents: bool) -> Self {
        Self {
            has_tangents,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> MeshKind {
        if self.joints.is_empty() {
            MeshKind::Static
        } else {
            MeshKind::Skinned
        }
    }

    pub fn flags(&self) -> u32 {
        if self.has_tangents { FLAG_TANGENTS } else { 0 }
    }
}

/// Fixed-size part of a mesh file following the magic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHeader {
    pub kind: MeshKind,
    pub version: u32,
    pub flags: u32,
    pub vertex_count: u32,
    pub triangle_count: u32,
}

impl MeshHeader {
    pub fn new(kind: MeshKind, flags: u32, vertex_count: u32, triangle_count: u32) -> Self {
        Self {
            kind,
            version: VK_ASSET_FORMAT.version,
            flags,
            vertex_count,
            triangle_count,
        }
    }

    /// Encoded size including the magic tag
    pub fn size(&self) -> usize {
        self.kind.magic().len() + 16
    }

    pub fn has_tangents(&self) -> bool {
        self.flags & FLAG_TANGENTS != 0
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.extend_from_slice(self.kind.magic());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.flags.to_le_bytes());
        bytes.extend_from_slice(&self.vertex_count.to_le_bytes());
        bytes.extend_from_slice(&self.triangle_count.to_le_bytes());
        bytes
    }

    /// Read header, detecting the layout from the magic tag
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let kind = if r.peek_magic(VK_ASSET_FORMAT.skinned_mesh_magic) {
            MeshKind::Skinned
        } else if r.peek_magic(VK_ASSET_FORMAT.static_mesh_magic) {
            MeshKind::Static
        } else {
            return Err(DecodeError::BadMagic {
                expected: "STATIC_MESH or SKINNED_MESH",
            });
        };
        r.expect_magic(kind.magic(), "mesh")?;

        let version = r.expect_version()?;
        Ok(Self {
            kind,
            version,
            flags: r.read_u32()?,
            vertex_count: r.read_u32()?,
            triangle_count: r.read_u32()?,
        })
    }
}

/// Decode a complete `.mesh` file (static or skinned).
pub fn read_mesh(bytes: &[u8]) -> Result<Mesh, DecodeError> {
    let mut r = ByteReader::new(bytes);
    let header = MeshHeader::read(&mut r)?;
    let skinned = header.kind == MeshKind::Skinned;

    // Fail early on truncated files instead of allocating for bogus counts
    let body = header.vertex_count as usize * header.kind.vertex_size()
        + header.triangle_count as usize * 12;
    if r.remaining() < body {
        return Err(DecodeError::UnexpectedEof {
            offset: r.position(),
            needed: body - r.remaining(),
        });
    }

    let mut mesh = Mesh::new(header.has_tangents());
    mesh.verts.reserve(header.vertex_count as usize);
    for _ in 0..header.vertex_count {
        let mut vertex = Vertex {
            position: r.read_f32s()?,
            normal: r.read_f32s()?,
            tangent: r.read_f32s()?,
            tex_coords: r.read_f32s()?,
            ..Default::default()
        };
        if skinned {
            vertex.joint_ids = r.read_i16s()?;
            vertex.joint_weights = r.read_f32s()?;
        }
        mesh.verts.push(vertex);
    }

    mesh.tris.reserve(header.triangle_count as usize);
    for _ in 0..header.triangle_count {
        mesh.tris.push(r.read_u32s()?);
    }

    if skinned {
        let joint_count = r.read_i16()?;
        if joint_count < 0 {
            return Err(DecodeError::InvalidJointCount(joint_count));
        }
        for _ in 0..joint_count {
            mesh.joints.push(ArmatureJoint {
                name: r.read_cstr()?,
                local_position: r.read_f32s()?,
                local_orientation: r.read_f32s()?,
                local_scale: r.read_f32s()?,
                parent_index: r.read_i16()?,
            });
        }
    }

    r.finish()?;
    Ok(mesh)
}
