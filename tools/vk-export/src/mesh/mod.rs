//! Mesh conversion (scene mesh object -> welded engine mesh)

mod weld;

pub use weld::VertexWelder;

use glam::{Mat4, Vec4};

use crate::coords::CoordinateSystem;
use crate::error::{ExportError, GeometryError};
use crate::formats::{Mesh, Vertex};
use crate::scene::{MeshData, ObjectId, ObjectKind, Scene};
use crate::skeleton::{self, JointMap};
use crate::transform::TransformPipeline;

/// Most vertex groups one vertex may be weighted to
pub const MAX_INFLUENCES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshOptions {
    pub apply_object_transform: bool,
    pub export_tangents: bool,
    pub reverse_winding: bool,
    /// Composed in front of everything else
    pub external: Mat4,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            apply_object_transform: false,
            export_tangents: true,
            reverse_winding: false,
            external: Mat4::IDENTITY,
        }
    }
}

/// Joint ids and stored weights for one source vertex
type Influences = ([i16; 4], [f32; 3]);

/// Round to 6 decimal places
fn round_weight(w: f32) -> f32 {
    ((w as f64 * 1e6).round() / 1e6) as f32
}

fn vertex_influences(
    data: &MeshData,
    vertex: usize,
    joints: &JointMap,
) -> Result<Influences, GeometryError> {
    let mut ids = Vertex::NO_JOINTS;
    let mut weights = [0.0f32; 3];

    let Some(groups) = data.vertex_groups.get(vertex) else {
        return Ok((ids, weights));
    };

    let count = groups.iter().filter(|g| g.weight != 0.0).count();
    if count > MAX_INFLUENCES {
        return Err(GeometryError::TooManyInfluences { vertex, count });
    }

    for (slot, group) in groups.iter().filter(|g| g.weight != 0.0).enumerate() {
        let name = &data.group_names[group.group];
        let joint = joints
            .joint_id(name)
            .ok_or_else(|| GeometryError::UnknownBoneForGroup(name.clone()))?;
        ids[slot] = joint as i16;
        // The fourth weight is implied by the loader
        if slot < 3 {
            weights[slot] = round_weight(group.weight);
        }
    }

    Ok((ids, weights))
}

/// Convert mesh object `id` into an engine mesh. Skinned when the mesh is bound
/// to an armature, static otherwise.
pub fn convert_mesh(
    scene: &Scene,
    id: ObjectId,
    options: &MeshOptions,
    coords: &CoordinateSystem,
) -> Result<Mesh, ExportError> {
    let object = scene
        .object(id)
        .ok_or_else(|| GeometryError::NotAMesh(format!("#{id}")))?;
    let ObjectKind::Mesh(data) = &object.kind else {
        return Err(GeometryError::NotAMesh(object.name.clone()).into());
    };

    if data.material_count > 1 {
        return Err(GeometryError::MultipleMaterials(data.material_count).into());
    }
    data.validate()?;
    let uvs = data.uvs.as_ref().ok_or(GeometryError::MissingUVs)?;

    let pipeline = TransformPipeline::new(
        options.external,
        options.apply_object_transform.then_some(object.world),
        coords,
    );

    let skeleton = match data.armature {
        Some(armature_id) => {
            let armature = scene.armature(armature_id).ok_or_else(|| {
                GeometryError::InvalidTopology(format!(
                    "bound object #{armature_id} is not an armature"
                ))
            })?;
            Some(skeleton::flatten(armature, &pipeline)?)
        }
        None if data.has_vertex_groups() => {
            return Err(GeometryError::UnboundVertexGroups.into());
        }
        None => None,
    };

    let tangents = match (options.export_tangents, &data.tangents) {
        (true, Some(tangents)) => Some(tangents),
        (true, None) => {
            tracing::warn!(
                "Mesh '{}' has no tangents, exporting without them",
                object.name
            );
            None
        }
        (false, _) => None,
    };

    let influences = match &skeleton {
        Some(skeleton) => (0..data.positions.len())
            .map(|v| vertex_influences(data, v, &skeleton.map))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let corner_vertex = |c: usize| -> Vertex {
        let corner = data.corners[c];
        let mut vertex = Vertex {
            position: pipeline.transform_point(data.positions[corner.vertex]).to_array(),
            normal: pipeline.transform_normal(corner.normal).to_array(),
            tex_coords: uvs[c].to_array(),
            ..Default::default()
        };
        if let Some(tangents) = tangents {
            let t: Vec4 = tangents[c];
            let xyz = pipeline.transform_normal(t.truncate());
            vertex.tangent = xyz.extend(t.w).to_array();
        }
        if let Some((ids, weights)) = influences.get(corner.vertex) {
            vertex.joint_ids = *ids;
            vertex.joint_weights = *weights;
        }
        vertex
    };

    let mut welder = VertexWelder::new(options.reverse_winding);
    for tri in &data.triangles {
        welder.push_triangle(tri.map(|c| corner_vertex(c)))?;
    }

    let joints = skeleton.map(|s| s.joints).unwrap_or_default();
    Ok(welder.finish(tangents.is_some(), joints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::MeshKind;
    use crate::scene::{Armature, Bone, Corner, GroupWeight, SceneObject};
    use glam::{Vec2, Vec3};

    fn coords(spec: &str) -> CoordinateSystem {
        CoordinateSystem::parse(spec).unwrap()
    }

    /// Two triangles sharing an edge, one material, flat +Z normal
    fn quad() -> MeshData {
        let corner_vertices = [0, 1, 2, 2, 1, 3];
        MeshData {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ],
            corners: corner_vertices
                .iter()
                .map(|&vertex| Corner {
                    vertex,
                    normal: Vec3::Z,
                })
                .collect(),
            uvs: Some(
                corner_vertices
                    .iter()
                    .map(|&v| Vec2::new((v % 2) as f32, (v / 2) as f32))
                    .collect(),
            ),
            tangents: Some(vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 6]),
            triangles: vec![[0, 1, 2], [3, 4, 5]],
            material_count: 1,
            ..Default::default()
        }
    }

    fn scene_with(data: MeshData) -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let id = scene.add(SceneObject::new("Quad", ObjectKind::Mesh(data)));
        (scene, id)
    }

    fn rigged(groups: Vec<Vec<GroupWeight>>) -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let rig = scene.add(SceneObject::new(
            "Rig",
            ObjectKind::Armature(Armature {
                bones: vec![
                    Bone::new("Root", None, Mat4::IDENTITY),
                    Bone::new("Arm", Some(0), Mat4::from_translation(Vec3::Y)),
                ],
            }),
        ));
        let mut data = quad();
        data.group_names = vec!["Arm".into(), "Root".into(), "Ghost".into()];
        data.vertex_groups = groups;
        data.armature = Some(rig);
        let id = scene.add(SceneObject::new("Body", ObjectKind::Mesh(data)));
        (scene, id)
    }

    fn weight(group: usize, weight: f32) -> GroupWeight {
        GroupWeight { group, weight }
    }

    #[test]
    fn test_static_quad_welds_shared_edge() {
        let (scene, id) = scene_with(quad());
        let mesh = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap();

        assert_eq!(mesh.kind(), MeshKind::Static);
        assert_eq!(mesh.verts.len(), 4);
        assert_eq!(mesh.tris, vec![[0, 1, 2], [2, 1, 3]]);
        assert!(mesh.has_tangents);
        assert_eq!(mesh.verts[3].tex_coords, [1.0, 1.0]);
        assert_eq!(mesh.verts[0].joint_ids, Vertex::NO_JOINTS);
    }

    #[test]
    fn test_reverse_winding() {
        let (scene, id) = scene_with(quad());
        let options = MeshOptions {
            reverse_winding: true,
            ..Default::default()
        };
        let mesh = convert_mesh(&scene, id, &options, &coords("+X+Y+Z")).unwrap();
        assert_eq!(mesh.tris, vec![[0, 2, 1], [2, 3, 1]]);
    }

    #[test]
    fn test_coordinate_conversion_applied() {
        let (scene, id) = scene_with(quad());
        let mesh = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Z-Y")).unwrap();
        // +Y maps to +Z, +Z normal maps to -Y
        assert_eq!(mesh.verts[2].position, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.verts[0].normal, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn test_object_transform_only_when_requested() {
        let mut scene = Scene::new();
        let id = scene.add(
            SceneObject::new("Quad", ObjectKind::Mesh(quad()))
                .with_world(Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0))),
        );

        let plain = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap();
        assert_eq!(plain.verts[0].position, [0.0, 0.0, 0.0]);

        let options = MeshOptions {
            apply_object_transform: true,
            ..Default::default()
        };
        let applied = convert_mesh(&scene, id, &options, &coords("+X+Y+Z")).unwrap();
        assert_eq!(applied.verts[0].position, [0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_tangents_disabled_are_zero() {
        let (scene, id) = scene_with(quad());
        let options = MeshOptions {
            export_tangents: false,
            ..Default::default()
        };
        let mesh = convert_mesh(&scene, id, &options, &coords("+X+Y+Z")).unwrap();
        assert!(!mesh.has_tangents);
        assert!(mesh.verts.iter().all(|v| v.tangent == [0.0; 4]));
    }

    #[test]
    fn test_missing_tangents_fall_back() {
        let mut data = quad();
        data.tangents = None;
        let (scene, id) = scene_with(data);
        let mesh = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap();
        assert!(!mesh.has_tangents);
        assert_eq!(mesh.verts.len(), 4);
    }

    #[test]
    fn test_missing_uvs() {
        let mut data = quad();
        data.uvs = None;
        let (scene, id) = scene_with(data);
        let err = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap_err();
        assert!(matches!(err, ExportError::Geometry(GeometryError::MissingUVs)));
    }

    #[test]
    fn test_multiple_materials() {
        let mut data = quad();
        data.material_count = 2;
        let (scene, id) = scene_with(data);
        let err = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Geometry(GeometryError::MultipleMaterials(2))
        ));
    }

    #[test]
    fn test_not_a_mesh() {
        let mut scene = Scene::new();
        let id = scene.add(SceneObject::new("Lamp", ObjectKind::Empty));
        let err = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap_err();
        assert!(matches!(err, ExportError::Geometry(GeometryError::NotAMesh(_))));
    }

    #[test]
    fn test_skinned_weights() {
        let (scene, id) = rigged(vec![
            vec![weight(0, 1.0)],
            vec![weight(1, 0.3333333333), weight(0, 0.6666666666)],
            vec![weight(2, 0.0), weight(0, 1.0)],
            Vec::new(),
        ]);
        let mesh = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap();

        assert_eq!(mesh.kind(), MeshKind::Skinned);
        assert_eq!(mesh.joints.len(), 2);
        assert_eq!(mesh.joints[0].name, "Root");
        assert_eq!(mesh.joints[1].parent_index, 0);

        // Arm is joint 1
        assert_eq!(mesh.verts[0].joint_ids, [1, -1, -1, -1]);
        assert_eq!(mesh.verts[0].joint_weights, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.verts[1].joint_ids, [0, 1, -1, -1]);
        assert_eq!(mesh.verts[1].joint_weights, [0.333333, 0.666667, 0.0]);
        // Zero-weight membership of an unknown bone is ignored
        assert_eq!(mesh.verts[2].joint_ids, [1, -1, -1, -1]);
        assert_eq!(mesh.verts[3].joint_ids, Vertex::NO_JOINTS);
    }

    #[test]
    fn test_fourth_weight_not_stored() {
        let mut scene = Scene::new();
        let rig = scene.add(SceneObject::new(
            "Rig",
            ObjectKind::Armature(Armature {
                bones: (0..4usize)
                    .map(|i| Bone::new(format!("B{i}"), i.checked_sub(1), Mat4::IDENTITY))
                    .collect(),
            }),
        ));
        let mut data = quad();
        data.group_names = (0..4).map(|i| format!("B{i}")).collect();
        data.vertex_groups = vec![(0..4).map(|g| weight(g, 0.25)).collect(); 4];
        data.armature = Some(rig);
        let id = scene.add(SceneObject::new("Body", ObjectKind::Mesh(data)));

        let mesh = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap();
        assert_eq!(mesh.verts[0].joint_ids, [0, 1, 2, 3]);
        assert_eq!(mesh.verts[0].joint_weights, [0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_too_many_influences() {
        let (scene, id) = rigged(vec![
            Vec::new(),
            vec![
                weight(0, 0.2),
                weight(1, 0.2),
                weight(0, 0.2),
                weight(1, 0.2),
                weight(0, 0.2),
            ],
            Vec::new(),
            Vec::new(),
        ]);
        let err = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Geometry(GeometryError::TooManyInfluences {
                vertex: 1,
                count: 5
            })
        ));
    }

    #[test]
    fn test_unknown_bone_for_group() {
        let (scene, id) = rigged(vec![vec![weight(2, 0.5)], Vec::new(), Vec::new(), Vec::new()]);
        let err = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Geometry(GeometryError::UnknownBoneForGroup(ref name)) if name == "Ghost"
        ));
    }

    #[test]
    fn test_groups_without_armature() {
        let mut data = quad();
        data.group_names = vec!["Arm".into()];
        data.vertex_groups = vec![vec![weight(0, 1.0)], Vec::new(), Vec::new(), Vec::new()];
        let (scene, id) = scene_with(data);
        let err = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Geometry(GeometryError::UnboundVertexGroups)
        ));
    }

    #[test]
    fn test_skeleton_errors_propagate() {
        let mut scene = Scene::new();
        let rig = scene.add(SceneObject::new(
            "Rig",
            ObjectKind::Armature(Armature::default()),
        ));
        let mut data = quad();
        data.armature = Some(rig);
        let id = scene.add(SceneObject::new("Body", ObjectKind::Mesh(data)));

        let err = convert_mesh(&scene, id, &MeshOptions::default(), &coords("+X+Y+Z")).unwrap_err();
        assert!(matches!(err, ExportError::Skeleton(_)));
    }

    #[test]
    fn test_round_weight() {
        assert_eq!(round_weight(0.1234567), 0.123457);
        assert_eq!(round_weight(1.0), 1.0);
    }
}
