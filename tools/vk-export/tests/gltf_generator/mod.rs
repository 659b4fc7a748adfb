//! Programmatic GLB generation for integration tests.
//!
//! Generates GLB files with:
//! - A skinned quad bound to a 2-bone rig (Root -> Arm)
//! - Two clips: "Wave" (Arm rotation) and "Idle" (Root translation)
//! - An empty marker node
//! - Optionally a static triangle without UVs

mod binary_packing;

use binary_packing::BufferPacker;
use serde_json::json;

/// Bone names in skin order
pub const BONES: [&str; 2] = ["Root", "Arm"];
/// Key times of the "Wave" clip, in seconds
pub const WAVE_TIMES: [f32; 2] = [0.0, 1.0];
/// Key times of the "Idle" clip, in seconds
pub const IDLE_TIMES: [f32; 2] = [0.0, 0.5];
/// Arm rest offset from Root
pub const ARM_OFFSET: [f32; 3] = [0.0, 1.0, 0.0];

/// Quaternion [x, y, z, w] for a rotation of `angle` about Z
pub fn rotation_z(angle: f32) -> [f32; 4] {
    let half = angle * 0.5;
    [0.0, 0.0, half.sin(), half.cos()]
}

/// Generate the rigged test scene.
///
/// Nodes: Root(0) -> Arm(1), Body(2) skinned mesh, Marker(3) empty.
/// Bottom vertices follow Root; top vertices are split 25/75 between Root and
/// Arm.
pub fn generate_rigged_glb() -> Vec<u8> {
    generate(false)
}

/// Same as [`generate_rigged_glb`] plus a static triangle "Prop" without UVs
pub fn generate_rigged_glb_with_prop() -> Vec<u8> {
    generate(true)
}

fn generate(with_prop: bool) -> Vec<u8> {
    let mut packer = BufferPacker::default();

    // --- Skinned quad ---
    let positions = [
        [-0.5, 0.0, 0.0],
        [0.5, 0.0, 0.0],
        [0.5, 2.0, 0.0],
        [-0.5, 2.0, 0.0],
    ];
    let pos = packer.push_vec3(&positions, true);
    let norm = packer.push_vec3(&[[0.0, 0.0, 1.0]; 4], false);
    let uv = packer.push_vec2(&[[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
    let joints = packer.push_joints(&[[0, 0, 0, 0], [0, 0, 0, 0], [0, 1, 0, 0], [0, 1, 0, 0]]);
    let weights = packer.push_vec4(&[
        [1.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [0.25, 0.75, 0.0, 0.0],
        [0.25, 0.75, 0.0, 0.0],
    ]);
    let indices = packer.push_indices(&[0, 1, 2, 0, 2, 3]);

    let mut meshes = vec![json!({
        "name": "Quad",
        "primitives": [{
            "attributes": {
                "POSITION": pos,
                "NORMAL": norm,
                "TEXCOORD_0": uv,
                "JOINTS_0": joints,
                "WEIGHTS_0": weights,
            },
            "indices": indices,
        }],
    })];

    // --- Clips ---
    let wave_times = packer.push_times(&WAVE_TIMES);
    let wave_rot = packer.push_vec4(&[rotation_z(0.0), rotation_z(1.0)]);
    let idle_times = packer.push_times(&IDLE_TIMES);
    let idle_pos = packer.push_vec3(&[[0.0, 0.0, 0.0], [0.0, 0.5, 0.0]], false);

    let mut nodes = vec![
        json!({ "name": "Root", "children": [1] }),
        json!({ "name": "Arm", "translation": ARM_OFFSET }),
        json!({ "name": "Body", "mesh": 0, "skin": 0 }),
        json!({ "name": "Marker", "translation": [3.0, 0.0, 0.0] }),
    ];
    let mut scene_nodes = vec![0, 2, 3];

    if with_prop {
        let pos = packer.push_vec3(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], true);
        meshes.push(json!({
            "name": "Tri",
            "primitives": [{ "attributes": { "POSITION": pos } }],
        }));
        nodes.push(json!({ "name": "Prop", "mesh": 1 }));
        scene_nodes.push(4);
    }

    let root = json!({
        "asset": { "version": "2.0", "generator": "vk-export tests" },
        "scene": 0,
        "scenes": [{ "nodes": scene_nodes }],
        "nodes": nodes,
        "meshes": meshes,
        "skins": [{ "name": "Rig", "joints": [0, 1], "skeleton": 0 }],
        "animations": [
            {
                "name": "Wave",
                "samplers": [{ "input": wave_times, "output": wave_rot, "interpolation": "LINEAR" }],
                "channels": [{ "sampler": 0, "target": { "node": 1, "path": "rotation" } }],
            },
            {
                "name": "Idle",
                "samplers": [{ "input": idle_times, "output": idle_pos, "interpolation": "LINEAR" }],
                "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }],
            },
        ],
    });

    packer.into_glb(root)
}
