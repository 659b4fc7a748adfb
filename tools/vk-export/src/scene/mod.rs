//! Read-only scene model the exporter consumes
//!
//! Objects are stored in a flat array and refer to each other by index
//! (`ObjectId`). Nothing in the pipeline mutates a scene once it is built.

pub mod gltf;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::GeometryError;

/// Index of an object within `Scene::objects`
pub type ObjectId = usize;

#[derive(Debug, Clone)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    /// Inclusive scene frame range
    pub frame_range: (i32, i32),
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            frame_range: (1, 250),
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.objects.iter().position(|o| o.name == name)
    }

    /// Armature data of object `id`, if it is an armature
    pub fn armature(&self, id: ObjectId) -> Option<&Armature> {
        match &self.objects.get(id)?.kind {
            ObjectKind::Armature(armature) => Some(armature),
            _ => None,
        }
    }

    pub fn armatures(&self) -> impl Iterator<Item = (ObjectId, &SceneObject, &Armature)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(id, o)| match &o.kind {
                ObjectKind::Armature(a) => Some((id, o, a)),
                _ => None,
            })
    }
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub world: Mat4,
    pub selected: bool,
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            world: Mat4::IDENTITY,
            selected: false,
            kind,
        }
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

/// Object type tag, resolved once at ingestion
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Empty,
    Light(Light),
    Mesh(MeshData),
    Armature(Armature),
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Empty => "empty",
            ObjectKind::Light(_) => "light",
            ObjectKind::Mesh(_) => "mesh",
            ObjectKind::Armature(_) => "armature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

/// One vertex group membership
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupWeight {
    /// Index into `MeshData::group_names`
    pub group: usize,
    pub weight: f32,
}

/// One triangle corner (face-vertex)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub vertex: usize,
    pub normal: Vec3,
}

/// Triangulated mesh geometry with per-corner attributes
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    /// Per-vertex group memberships; empty when the mesh has no groups at all
    pub vertex_groups: Vec<Vec<GroupWeight>>,
    pub group_names: Vec<String>,
    pub corners: Vec<Corner>,
    /// Active UV layer, one entry per corner
    pub uvs: Option<Vec<Vec2>>,
    /// xyz tangent and bitangent sign in w, one entry per corner
    pub tangents: Option<Vec<Vec4>>,
    /// Corner index triples
    pub triangles: Vec<[usize; 3]>,
    pub material_count: usize,
    /// Armature object bound through a skin/armature modifier
    pub armature: Option<ObjectId>,
}

impl MeshData {
    /// Whether any vertex carries a group membership
    pub fn has_vertex_groups(&self) -> bool {
        self.vertex_groups.iter().any(|groups| !groups.is_empty())
    }

    /// Check that every cross-reference stays in bounds
    pub fn validate(&self) -> Result<(), GeometryError> {
        let corner_count = self.corners.len();

        if let Some(tri) = self
            .triangles
            .iter()
            .find(|tri| tri.iter().any(|&c| c >= corner_count))
        {
            return Err(GeometryError::InvalidTopology(format!(
                "triangle {:?} references a corner past {}",
                tri, corner_count
            )));
        }

        if let Some((i, corner)) = self
            .corners
            .iter()
            .enumerate()
            .find(|(_, c)| c.vertex >= self.positions.len())
        {
            return Err(GeometryError::InvalidTopology(format!(
                "corner {} references vertex {} of {}",
                i,
                corner.vertex,
                self.positions.len()
            )));
        }

        if let Some(len) = self.uvs.as_ref().map(Vec::len).filter(|&n| n != corner_count) {
            return Err(GeometryError::InvalidTopology(format!(
                "UV layer has {} entries for {} corners",
                len, corner_count
            )));
        }

        if let Some(len) = self.tangents.as_ref().map(Vec::len).filter(|&n| n != corner_count) {
            return Err(GeometryError::InvalidTopology(format!(
                "tangent layer has {} entries for {} corners",
                len, corner_count
            )));
        }

        if !self.vertex_groups.is_empty() && self.vertex_groups.len() != self.positions.len() {
            return Err(GeometryError::InvalidTopology(format!(
                "{} vertex group lists for {} vertices",
                self.vertex_groups.len(),
                self.positions.len()
            )));
        }

        let group_count = self.group_names.len();
        if self
            .vertex_groups
            .iter()
            .flatten()
            .any(|g| g.group >= group_count)
        {
            return Err(GeometryError::InvalidTopology(format!(
                "vertex group index past {}",
                group_count
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub deform: bool,
    /// Rest matrix in armature space
    pub rest: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Mat4) -> Self {
        Self {
            name: name.into(),
            parent,
            deform: true,
            rest,
        }
    }

    pub fn non_deform(mut self) -> Self {
        self.deform = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Armature {
    pub bones: Vec<Bone>,
}

impl Armature {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Rest matrices relative to each bone's parent (root: armature space)
    pub fn rest_locals(&self) -> Vec<Mat4> {
        self.bones
            .iter()
            .map(|bone| match bone.parent.and_then(|p| self.bones.get(p)) {
                Some(parent) => parent.rest.inverse() * bone.rest,
                None => bone.rest,
            })
            .collect()
    }
}
