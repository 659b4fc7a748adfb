//! glTF/GLB ingestion into the scene model
//!
//! Skins become armature objects, nodes with meshes become mesh objects and
//! animations become clips keyed by joint name. Joint nodes are bones, not
//! objects.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use hashbrown::{HashMap, HashSet};

use super::{
    Armature, Bone, Corner, GroupWeight, Light, LightKind, MeshData, ObjectId, ObjectKind, Scene,
    SceneObject,
};
use crate::animation::{BoneTrack, Clip, Interpolation, Keyframes, SceneHost};

/// Default sample rate used to convert glTF seconds to frames
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

/// Load a glTF/GLB file. Key times are converted to frames at `frame_rate`.
pub fn load_gltf(path: &Path, frame_rate: f32) -> Result<SceneHost> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;
    Ok(build_host(&document, &buffers, frame_rate))
}

/// Load a GLB (or self-contained glTF) from memory
pub fn load_gltf_slice(bytes: &[u8], frame_rate: f32) -> Result<SceneHost> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).context("Failed to parse glTF data")?;
    Ok(build_host(&document, &buffers, frame_rate))
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Node{}", node.index()))
}

/// Parent links and global transforms for every node
struct NodeHierarchy {
    parent: Vec<Option<usize>>,
    global: Vec<Mat4>,
}

impl NodeHierarchy {
    fn new(document: &gltf::Document) -> Self {
        let count = document.nodes().count();
        let mut parent = vec![None; count];
        let mut local = vec![Mat4::IDENTITY; count];

        for node in document.nodes() {
            local[node.index()] = Mat4::from_cols_array_2d(&node.transform().matrix());
            for child in node.children() {
                parent[child.index()] = Some(node.index());
            }
        }

        let mut global = vec![Mat4::IDENTITY; count];
        let mut stack: Vec<usize> = (0..count).filter(|&n| parent[n].is_none()).collect();
        let children: Vec<Vec<usize>> = document
            .nodes()
            .map(|n| n.children().map(|c| c.index()).collect())
            .collect();
        let mut visited = vec![false; count];

        while let Some(n) = stack.pop() {
            if std::mem::replace(&mut visited[n], true) {
                continue;
            }
            global[n] = match parent[n] {
                Some(p) => global[p] * local[n],
                None => local[n],
            };
            stack.extend(children[n].iter().copied());
        }

        Self { parent, global }
    }

    fn global(&self, node: usize) -> Mat4 {
        self.global.get(node).copied().unwrap_or(Mat4::IDENTITY)
    }

    /// Nearest ancestor of `node` that satisfies `pred`
    fn nearest_ancestor(&self, node: usize, pred: impl Fn(usize) -> bool) -> Option<usize> {
        let mut cursor = self.parent.get(node).copied().flatten();
        let mut steps = 0;
        while let Some(n) = cursor {
            if pred(n) {
                return Some(n);
            }
            steps += 1;
            if steps > self.parent.len() {
                break;
            }
            cursor = self.parent[n];
        }
        None
    }
}

fn armature_object(skin: &gltf::Skin, hierarchy: &NodeHierarchy) -> SceneObject {
    let joints: Vec<gltf::Node> = skin.joints().collect();
    let bone_of: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(bone, node)| (node.index(), bone))
        .collect();

    let parents: Vec<Option<usize>> = joints
        .iter()
        .map(|node| {
            hierarchy
                .nearest_ancestor(node.index(), |n| bone_of.contains_key(&n))
                .and_then(|n| bone_of.get(&n).copied())
        })
        .collect();

    // The armature object sits where the root joint's parent node is
    let world = joints
        .iter()
        .zip(&parents)
        .find(|(_, parent)| parent.is_none())
        .and_then(|(root, _)| hierarchy.parent[root.index()])
        .map_or(Mat4::IDENTITY, |n| hierarchy.global(n));
    let to_armature = world.inverse();

    let bones = joints
        .iter()
        .zip(parents)
        .map(|(node, parent)| {
            Bone::new(
                node_name(node),
                parent,
                to_armature * hierarchy.global(node.index()),
            )
        })
        .collect();

    let name = skin
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Armature{}", skin.index()));

    SceneObject::new(name, ObjectKind::Armature(Armature { bones })).with_world(world)
}

/// Attributes whose count disagrees with POSITION are treated as absent
fn per_vertex<T>(values: Option<Vec<T>>, vertex_count: usize) -> Option<Vec<T>> {
    values.filter(|v| v.len() == vertex_count)
}

fn flat_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

fn mesh_data(
    node: &gltf::Node,
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    armature: Option<ObjectId>,
) -> MeshData {
    let mut data = MeshData {
        armature,
        ..Default::default()
    };
    let skin = node.skin();
    if let Some(skin) = &skin {
        data.group_names = skin.joints().map(|j| node_name(&j)).collect();
    }

    let mut uvs = Some(Vec::new());
    let mut tangents = Some(Vec::new());
    let mut materials = HashSet::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!(
                "Mesh '{}': skipping {:?} primitive, only triangles are exported",
                node_name(node),
                primitive.mode()
            );
            continue;
        }
        materials.insert(primitive.material().index());

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let Some(positions) = reader.read_positions() else {
            tracing::warn!("Mesh '{}': primitive has no positions", node_name(node));
            continue;
        };

        let base = data.positions.len();
        data.positions.extend(positions.map(Vec3::from_array));
        let vertex_count = data.positions.len() - base;

        let normals: Option<Vec<Vec3>> = per_vertex(
            reader
                .read_normals()
                .map(|iter| iter.map(Vec3::from_array).collect()),
            vertex_count,
        );
        let prim_uvs: Option<Vec<Vec2>> = per_vertex(
            reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().map(Vec2::from_array).collect()),
            vertex_count,
        );
        let prim_tangents: Option<Vec<Vec4>> = per_vertex(
            reader
                .read_tangents()
                .map(|iter| iter.map(Vec4::from_array).collect()),
            vertex_count,
        );
        let indices: Vec<usize> = match reader.read_indices() {
            Some(iter) => iter.into_u32().map(|i| i as usize).collect(),
            None => (0..vertex_count).collect(),
        };

        match (
            &skin,
            reader.read_joints(0).map(|j| j.into_u16().collect::<Vec<_>>()),
            reader.read_weights(0).map(|w| w.into_f32().collect::<Vec<_>>()),
        ) {
            (Some(_), Some(joints), Some(weights)) => {
                data.vertex_groups.resize(base, Vec::new());
                for (ids, ws) in joints.iter().zip(&weights).take(vertex_count) {
                    data.vertex_groups.push(
                        ids.iter()
                            .zip(ws)
                            .filter(|(_, w)| **w != 0.0)
                            .map(|(&group, &weight)| GroupWeight {
                                group: group as usize,
                                weight,
                            })
                            .collect(),
                    );
                }
            }
            (None, Some(_), _) => {
                tracing::warn!(
                    "Mesh '{}' has joint data but its node has no skin, ignoring skinning",
                    node_name(node)
                );
            }
            (Some(_), Some(_), None) | (Some(_), None, Some(_)) => {
                tracing::warn!(
                    "Mesh '{}' has partial skinning data (joints or weights missing), ignoring skinning",
                    node_name(node)
                );
            }
            _ => {}
        }

        for tri in indices.chunks_exact(3) {
            if tri.iter().any(|&v| v >= vertex_count) {
                tracing::warn!(
                    "Mesh '{}': skipping triangle {:?} with an out-of-range index",
                    node_name(node),
                    tri
                );
                continue;
            }
            let first_corner = data.corners.len();
            let face_normal = flat_normal(
                data.positions[base + tri[0]],
                data.positions[base + tri[1]],
                data.positions[base + tri[2]],
            );
            for &v in tri {
                data.corners.push(Corner {
                    vertex: base + v,
                    normal: normals.as_ref().map_or(face_normal, |n| n[v]),
                });
                if let (Some(out), Some(src)) = (uvs.as_mut(), prim_uvs.as_ref()) {
                    out.push(src[v]);
                }
                if let (Some(out), Some(src)) = (tangents.as_mut(), prim_tangents.as_ref()) {
                    out.push(src[v]);
                }
            }
            data.triangles
                .push([first_corner, first_corner + 1, first_corner + 2]);
        }

        if prim_uvs.is_none() {
            uvs = None;
        }
        if prim_tangents.is_none() {
            tangents = None;
        }
    }

    if data.vertex_groups.iter().any(|g| !g.is_empty()) {
        data.vertex_groups.resize(data.positions.len(), Vec::new());
    } else {
        data.vertex_groups.clear();
    }
    data.uvs = uvs;
    data.tangents = tangents;
    data.material_count = materials.len();
    data
}

fn light_object(light: &gltf::khr_lights_punctual::Light) -> Light {
    use gltf::khr_lights_punctual::Kind;

    let kind = match light.kind() {
        Kind::Directional => LightKind::Directional,
        Kind::Point => LightKind::Point,
        Kind::Spot { .. } => LightKind::Spot,
    };
    Light {
        kind,
        color: Vec3::from_array(light.color()),
        intensity: light.intensity(),
    }
}

fn keyframes<T: Copy>(
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: gltf::animation::Interpolation,
) -> Keyframes<T> {
    use gltf::animation::Interpolation as Gltf;

    match interpolation {
        Gltf::Step => Keyframes::new(times, values, Interpolation::Step),
        Gltf::Linear => Keyframes::new(times, values, Interpolation::Linear),
        // (in-tangent, value, out-tangent) triples; keep the values only
        Gltf::CubicSpline => Keyframes::new(
            times,
            values.chunks_exact(3).map(|c| c[1]).collect(),
            Interpolation::Linear,
        ),
    }
}

fn clip(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
    joint_nodes: &HashSet<usize>,
    frame_rate: f32,
) -> Clip {
    use gltf::animation::util::ReadOutputs;

    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Animation{}", animation.index()));
    let mut clip = Clip::new(name, (0, 0));

    for channel in animation.channels() {
        let node = channel.target().node();
        if !joint_nodes.contains(&node.index()) {
            continue;
        }

        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f32> = inputs.map(|t| t * frame_rate).collect();
        let interpolation = channel.sampler().interpolation();
        let track: &mut BoneTrack = clip.tracks.entry(node_name(&node)).or_default();

        match outputs {
            ReadOutputs::Translations(values) => {
                let values = values.map(Vec3::from_array).collect();
                track.translation = Some(keyframes(times, values, interpolation));
            }
            ReadOutputs::Rotations(values) => {
                let values = values.into_f32().map(Quat::from_array).collect();
                track.rotation = Some(keyframes(times, values, interpolation));
            }
            ReadOutputs::Scales(values) => {
                let values = values.map(Vec3::from_array).collect();
                track.scale = Some(keyframes(times, values, interpolation));
            }
            ReadOutputs::MorphTargetWeights(_) => {}
        }
    }

    if let Some(range) = clip.key_range() {
        clip.frame_range = range;
    }
    clip
}

fn build_host(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    frame_rate: f32,
) -> SceneHost {
    let hierarchy = NodeHierarchy::new(document);
    let mut scene = Scene::new();

    let mut joint_nodes = HashSet::new();
    let mut skin_objects = Vec::new();
    for skin in document.skins() {
        joint_nodes.extend(skin.joints().map(|j| j.index()));
        skin_objects.push(scene.add(armature_object(&skin, &hierarchy)));
    }

    for node in document.nodes() {
        let world = hierarchy.global(node.index());
        let kind = if let Some(mesh) = node.mesh() {
            let armature = node.skin().and_then(|s| skin_objects.get(s.index()).copied());
            ObjectKind::Mesh(mesh_data(&node, &mesh, buffers, armature))
        } else if joint_nodes.contains(&node.index()) {
            continue;
        } else if let Some(light) = node.light() {
            ObjectKind::Light(light_object(&light))
        } else {
            ObjectKind::Empty
        };
        scene.add(SceneObject::new(node_name(&node), kind).with_world(world));
    }

    let clips: Vec<Clip> = document
        .animations()
        .map(|a| clip(&a, buffers, &joint_nodes, frame_rate))
        .collect();

    scene.frame_range = clips
        .iter()
        .map(|c| c.frame_range)
        .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
        .unwrap_or((0, 0));

    tracing::debug!(
        "Loaded scene: {} objects, {} clips",
        scene.objects.len(),
        clips.len()
    );

    SceneHost::new(scene, clips)
}
