//! Asset format constants
//!
//! This module defines the `AssetFormat` struct which serves as the single source of truth
//! for all asset-related constants (magic tags, format version, file extensions).
//!
//! # Example
//!
//! ```
//! use vk_common::VK_ASSET_FORMAT;
//!
//! assert_eq!(VK_ASSET_FORMAT.mesh_ext, "mesh");
//! assert_eq!(VK_ASSET_FORMAT.static_mesh_magic, b"STATIC_MESH");
//! ```

/// Asset format specification for the engine.
///
/// Magic tags are raw ASCII written at the start of each file, without a
/// length prefix or terminator.
#[derive(Debug, Clone, Copy)]
pub struct AssetFormat {
    /// Format revision written after the magic tag.
    ///
    /// Loaders must reject any other value.
    pub version: u32,

    /// Magic tag for static meshes
    pub static_mesh_magic: &'static [u8],

    /// Magic tag for skinned meshes
    pub skinned_mesh_magic: &'static [u8],

    /// Magic tag for sampled armature animations
    pub animation_magic: &'static [u8],

    /// Mesh file extension without dot
    pub mesh_ext: &'static str,

    /// Animation file extension without dot
    pub animation_ext: &'static str,
}

impl AssetFormat {
    /// Create a new asset format specification.
    pub const fn new(
        version: u32,
        static_mesh_magic: &'static [u8],
        skinned_mesh_magic: &'static [u8],
        animation_magic: &'static [u8],
        mesh_ext: &'static str,
        animation_ext: &'static str,
    ) -> Self {
        Self {
            version,
            static_mesh_magic,
            skinned_mesh_magic,
            animation_magic,
            mesh_ext,
            animation_ext,
        }
    }
}

/// Vk-Engine asset format specification.
///
/// - Version: `10000`
/// - Magic tags: `STATIC_MESH`, `SKINNED_MESH`, `ARMATURE_ANIMATION`
/// - Extensions: `.mesh`, `.anim`
pub const VK_ASSET_FORMAT: AssetFormat = AssetFormat::new(
    10000,
    b"STATIC_MESH",
    b"SKINNED_MESH",
    b"ARMATURE_ANIMATION",
    "mesh",
    "anim",
);
