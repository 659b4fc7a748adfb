//! Vk-Engine binary asset formats
//!
//! Three formats, all little-endian and opened by an ASCII magic tag followed by
//! a `u32` version (see [`crate::VK_ASSET_FORMAT`]):
//!
//! - `STATIC_MESH` / `SKINNED_MESH` ([`mesh`])
//! - `ARMATURE_ANIMATION` ([`animation`])
//!
//! This crate holds the in-memory types and the decoders. Encoding lives in the
//! exporter, which is the only writer.

pub mod animation;
pub mod mesh;
mod reader;

pub use animation::*;
pub use mesh::*;
pub use reader::{ByteReader, DecodeError};
