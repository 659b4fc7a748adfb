//! End-to-end tests over an in-memory scene.
//!
//! Builds a scene without any file input, exports it and decodes the results
//! with the vk-common readers.

use glam::{Mat4, Quat, Vec2, Vec3};
use tempfile::tempdir;

use vk_export::animation::{AnimationHost, BoneTrack, Clip, Interpolation, Keyframes, SceneHost};
use vk_export::export::{self, AnimationSettings};
use vk_export::formats::{MeshKind, read_animation, read_mesh};
use vk_export::scene::{Armature, Bone, Corner, GroupWeight, MeshData, ObjectKind, Scene, SceneObject};
use vk_export::{CoordinateSystem, ExportError, MeshOptions, SkeletonError};

/// Root at the origin, Arm one unit up
fn two_bone_rig() -> Armature {
    Armature {
        bones: vec![
            Bone::new("Root", None, Mat4::IDENTITY),
            Bone::new("Arm", Some(0), Mat4::from_translation(Vec3::Y)),
        ],
    }
}

/// One triangle, every vertex fully weighted to `group`
fn weighted_triangle(group: &str, armature: usize) -> MeshData {
    MeshData {
        positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vertex_groups: vec![vec![GroupWeight { group: 0, weight: 1.0 }]; 3],
        group_names: vec![group.to_string()],
        corners: (0..3)
            .map(|vertex| Corner {
                vertex,
                normal: Vec3::Z,
            })
            .collect(),
        uvs: Some(vec![Vec2::ZERO, Vec2::X, Vec2::Y]),
        triangles: vec![[0, 1, 2]],
        material_count: 1,
        armature: Some(armature),
        ..Default::default()
    }
}

fn swing_clip() -> Clip {
    Clip::new("Swing", (1, 3)).with_track(
        "Arm",
        BoneTrack {
            rotation: Some(Keyframes::new(
                vec![1.0, 3.0],
                vec![Quat::IDENTITY, Quat::from_rotation_x(0.5)],
                Interpolation::Linear,
            )),
            ..Default::default()
        },
    )
}

fn scenario() -> SceneHost {
    let mut scene = Scene::new();
    scene.frame_range = (1, 3);
    let rig = scene.add(SceneObject::new("Rig", ObjectKind::Armature(two_bone_rig())));
    scene.add(SceneObject::new(
        "Body",
        ObjectKind::Mesh(weighted_triangle("Arm", rig)),
    ));
    SceneHost::new(scene, vec![swing_clip()])
}

#[test]
fn test_skinned_mesh_and_clip_share_joint_order() {
    let mut host = scenario();
    let coords = CoordinateSystem::parse("+X+Z-Y").expect("valid coordinate system");
    assert!(!coords.is_left_handed());
    let dir = tempdir().expect("Failed to create temp dir");

    let meshes = export::export_meshes(&host.scene, dir.path(), &MeshOptions::default(), false, &coords);
    assert!(meshes.is_success(), "{:?}", meshes.failures);

    let anims = export::export_animations(&mut host, dir.path(), &AnimationSettings::default(), &coords)
        .expect("valid settings");
    assert!(anims.is_success(), "{:?}", anims.failures);

    let mesh_bytes = std::fs::read(dir.path().join("Body.mesh")).expect("Body.mesh written");
    let mesh = read_mesh(&mesh_bytes).expect("Failed to decode mesh");
    assert_eq!(mesh.kind(), MeshKind::Skinned);
    assert_eq!(mesh.joints.len(), 2);

    let anim_bytes = std::fs::read(dir.path().join("Swing.anim")).expect("Swing.anim written");
    let anim = read_animation(&anim_bytes).expect("Failed to decode animation");
    assert_eq!(anim.poses.len(), 3);
    assert_eq!(anim.joint_count(), 2);

    let mesh_names: Vec<&str> = mesh.joints.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(mesh_names, ["Root", "Arm"]);
    assert_eq!(anim.joint_names, ["Root", "Arm"]);

    // Every vertex is bound to Arm only
    for v in &mesh.verts {
        assert_eq!(v.joint_ids, [1, -1, -1, -1]);
        assert_eq!(v.joint_weights, [1.0, 0.0, 0.0]);
    }

    // First frame is the rest pose, so it matches the mesh's joints
    for (sample, joint) in anim.poses[0].joints.iter().zip(&mesh.joints) {
        for i in 0..3 {
            assert!((sample.local_position[i] - joint.local_position[i]).abs() < 1e-5);
        }
    }

    // Host timeline is untouched
    assert_eq!(host.current_frame(), 1);
    assert_eq!(host.active_clip(0), None);
}

#[test]
fn test_oversized_armature_writes_no_mesh() {
    let bones: Vec<Bone> = (0..32768)
        .map(|i| {
            Bone::new(
                format!("Bone{i}"),
                if i == 0 { None } else { Some(0) },
                Mat4::IDENTITY,
            )
        })
        .collect();

    let mut scene = Scene::new();
    let rig = scene.add(SceneObject::new("Rig", ObjectKind::Armature(Armature { bones })));
    scene.add(SceneObject::new(
        "Body",
        ObjectKind::Mesh(weighted_triangle("Bone1", rig)),
    ));

    let dir = tempdir().expect("Failed to create temp dir");
    let summary = export::export_meshes(
        &scene,
        dir.path(),
        &MeshOptions::default(),
        false,
        &CoordinateSystem::default(),
    );

    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(
        summary.failures[0].error,
        ExportError::Skeleton(SkeletonError::TooManyJoints(32768))
    ));
    assert!(!dir.path().join("Body.mesh").exists());
    assert!(!dir.path().join("Body.mesh.tmp").exists());
}

#[test]
fn test_static_mesh_without_armature() {
    let mut data = weighted_triangle("Arm", 0);
    data.armature = None;
    data.vertex_groups.clear();
    data.group_names.clear();

    let mut scene = Scene::new();
    scene.add(SceneObject::new("Prop", ObjectKind::Mesh(data)));

    let dir = tempdir().expect("Failed to create temp dir");
    let summary = export::export_meshes(
        &scene,
        dir.path(),
        &MeshOptions::default(),
        false,
        &CoordinateSystem::default(),
    );
    assert!(summary.is_success());

    let bytes = std::fs::read(dir.path().join("Prop.mesh")).unwrap();
    assert!(bytes.starts_with(b"STATIC_MESH"));
    let mesh = read_mesh(&bytes).unwrap();
    assert_eq!(mesh.verts.len(), 3);
    assert!(mesh.joints.is_empty());
}
