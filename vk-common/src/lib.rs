//! Shared types for Vk-Engine binary assets
//!
//! This crate is the contract between:
//! - `vk-export` (asset pipeline, writes the formats)
//! - engine-side loaders and inspection tools (read the formats)
//!
//! # Modules
//!
//! - [`asset_format`] - Magic tags, format version and file extensions
//! - [`formats`] - In-memory asset types, headers and decoders

pub mod asset_format;
pub mod formats;

pub use asset_format::{AssetFormat, VK_ASSET_FORMAT};

pub use formats::{
    ANIMATION_POSE_JOINT_SIZE, AnimationHeader, ArmatureJoint, ArmaturePose, ByteReader,
    DecodeError, FLAG_TANGENTS, JointSample, Mesh, MeshHeader, MeshKind, SKINNED_VERTEX_SIZE,
    STATIC_VERTEX_SIZE, SampledAnimation, Vertex, read_animation, read_mesh,
};
