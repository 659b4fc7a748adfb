//! Error kinds for the export pipeline
//!
//! `ConfigError` blocks a whole run. Every other kind fails a single unit of
//! work (one mesh object, one clip, one output file) and the run continues.

use std::path::PathBuf;

/// Invalid run configuration. Fatal before any processing starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid coordinate system '{0}': expected 6 characters like +X+Y+Z")]
    InvalidFormat(String),

    #[error("invalid coordinate system '{0}': each axis must be [+-][XYZ]")]
    InvalidAxis(String),

    #[error("invalid coordinate system '{0}': axes must be distinct")]
    DuplicateAxis(String),

    #[error("frame step must be at least 1, got {0}")]
    InvalidFrameStep(i32),

    #[error("frame rate must be positive, got {0}")]
    InvalidFrameRate(f32),
}

/// Bone hierarchy cannot be flattened into a joint array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkeletonError {
    #[error("could not find a deform root bone")]
    NoRootBone,

    #[error("found multiple deform root bones ('{first}' and '{second}')")]
    MultipleRootBones { first: String, second: String },

    #[error("armature has {0} bones, which is more than the maximum allowed of 32767")]
    TooManyJoints(usize),

    #[error("bone name '{0}' is used by more than one deform bone")]
    DuplicateBoneName(String),

    #[error("bone {bone} has parent index {parent} outside the bone array")]
    InvalidParent { bone: usize, parent: usize },
}

/// Mesh data cannot be welded into engine vertices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("mesh has no UVs; they are required to compute tangents in the engine")]
    MissingUVs,

    #[error("vertex is assigned to group '{0}' but no deform bone has this name")]
    UnknownBoneForGroup(String),

    #[error("vertex {vertex} has {count} weighted groups, maximum is 4")]
    TooManyInfluences { vertex: usize, count: usize },

    #[error("mesh has {0} materials assigned; separate it by material first")]
    MultipleMaterials(usize),

    #[error("vertices are assigned to vertex groups but no armature is bound to the mesh")]
    UnboundVertexGroups,

    #[error("invalid mesh topology: {0}")]
    InvalidTopology(String),

    #[error("object '{0}' is not a mesh")]
    NotAMesh(String),
}

/// A clip cannot be sampled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnimationError {
    #[error("invalid frame range [{begin}, {end}]")]
    InvalidFrameRange { begin: i32, end: i32 },

    #[error("object '{0}' is not an armature")]
    NotAnArmature(String),

    #[error("no clip named '{0}'")]
    UnknownClip(String),

    #[error("host returned {got} bone matrices for an armature with {expected} bones")]
    PoseSizeMismatch { expected: usize, got: usize },
}

/// Failure of one export unit.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Skeleton(#[from] SkeletonError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Animation(#[from] AnimationError),

    #[error(transparent)]
    Encode(#[from] crate::formats::EncodeError),

    #[error("{path:?} was already written by {first} in this run")]
    OutputCollision { path: PathBuf, first: String },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
