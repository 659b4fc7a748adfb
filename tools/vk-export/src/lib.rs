//! vk-export library
//!
//! Converts authored scenes into engine mesh and animation files. The CLI is a
//! thin wrapper over [`export::run`]; other tools can drive the pipeline
//! directly with an in-memory [`scene::Scene`] and an [`animation::AnimationHost`].

pub mod animation;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod formats;
pub mod mesh;
pub mod scene;
pub mod skeleton;
pub mod transform;

// Re-export the format contract from vk-common
pub use vk_common::{AssetFormat, VK_ASSET_FORMAT};

pub use coords::{Axis, CoordinateSystem, SignedAxis};
pub use error::{AnimationError, ConfigError, ExportError, GeometryError, SkeletonError};

// Re-export key entry points
pub use config::{ExportConfig, load_config};
pub use export::{AnimationSettings, ExportFailure, ExportSummary, export_animations, export_meshes};
pub use mesh::{MeshOptions, convert_mesh};
pub use skeleton::{JointMap, Skeleton, flatten};
pub use transform::{LocalTrs, TransformPipeline};
