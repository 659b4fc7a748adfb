//! Binary data packing for GLTF buffers.

use serde_json::{Value, json};

pub(crate) const FLOAT: u32 = 5126;
pub(crate) const UNSIGNED_BYTE: u32 = 5121;
pub(crate) const UNSIGNED_SHORT: u32 = 5123;

/// Single-buffer packer producing buffer views and accessors in push order
#[derive(Default)]
pub(crate) struct BufferPacker {
    pub buffer: Vec<u8>,
    pub views: Vec<Value>,
    pub accessors: Vec<Value>,
}

impl BufferPacker {
    /// Append `bytes` as a new view and return the accessor index
    pub fn push(
        &mut self,
        bytes: &[u8],
        count: usize,
        component_type: u32,
        type_: &str,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> usize {
        while !self.buffer.len().is_multiple_of(4) {
            self.buffer.push(0);
        }
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);

        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        }));

        let mut accessor = json!({
            "bufferView": self.views.len() - 1,
            "componentType": component_type,
            "count": count,
            "type": type_,
        });
        if let Some((min, max)) = bounds {
            accessor["min"] = json!(min);
            accessor["max"] = json!(max);
        }
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    pub fn push_vec3(&mut self, values: &[[f32; 3]], with_bounds: bool) -> usize {
        let bounds = with_bounds.then(|| compute_bounds(values));
        self.push(
            bytemuck::cast_slice(values),
            values.len(),
            FLOAT,
            "VEC3",
            bounds.map(|(min, max)| (min.to_vec(), max.to_vec())),
        )
    }

    pub fn push_vec2(&mut self, values: &[[f32; 2]]) -> usize {
        self.push(bytemuck::cast_slice(values), values.len(), FLOAT, "VEC2", None)
    }

    pub fn push_vec4(&mut self, values: &[[f32; 4]]) -> usize {
        self.push(bytemuck::cast_slice(values), values.len(), FLOAT, "VEC4", None)
    }

    pub fn push_joints(&mut self, values: &[[u8; 4]]) -> usize {
        self.push(bytemuck::cast_slice(values), values.len(), UNSIGNED_BYTE, "VEC4", None)
    }

    pub fn push_indices(&mut self, values: &[u16]) -> usize {
        self.push(bytemuck::cast_slice(values), values.len(), UNSIGNED_SHORT, "SCALAR", None)
    }

    /// Keyframe times; animation inputs carry bounds
    pub fn push_times(&mut self, times: &[f32]) -> usize {
        let min = times.iter().copied().fold(f32::INFINITY, f32::min);
        let max = times.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.push(
            bytemuck::cast_slice(times),
            times.len(),
            FLOAT,
            "SCALAR",
            Some((vec![min], vec![max])),
        )
    }
}

/// Compute bounding box for positions
/// Append one GLB chunk, padded to 4 bytes with `pad`
fn write_chunk(glb: &mut Vec<u8>, kind: &[u8; 4], data: &[u8], pad: u8) {
    let padded = data.len().next_multiple_of(4);
    glb.extend_from_slice(&(padded as u32).to_le_bytes());
    glb.extend_from_slice(kind);
    glb.extend_from_slice(data);
    glb.resize(glb.len() + padded - data.len(), pad);
}

impl BufferPacker {
    /// Finish the document: point `root` at the packed buffer and emit a GLB
    /// with a JSON chunk and a BIN chunk.
    pub fn into_glb(self, mut root: Value) -> Vec<u8> {
        root["bufferViews"] = Value::Array(self.views);
        root["accessors"] = Value::Array(self.accessors);
        root["buffers"] = json!([{ "byteLength": self.buffer.len() }]);
        let json = serde_json::to_vec(&root).expect("Failed to serialize glTF JSON");

        let mut glb = b"glTF".to_vec();
        glb.extend_from_slice(&2u32.to_le_bytes());
        // Total length, patched once the chunks are in
        glb.extend_from_slice(&0u32.to_le_bytes());
        write_chunk(&mut glb, b"JSON", &json, b' ');
        write_chunk(&mut glb, b"BIN\0", &self.buffer, 0);

        let total = glb.len() as u32;
        glb[8..12].copy_from_slice(&total.to_le_bytes());
        glb
    }
}

pub(crate) fn compute_bounds(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for pos in positions {
        for i in 0..3 {
            min[i] = min[i].min(pos[i]);
            max[i] = max[i].max(pos[i]);
        }
    }
    (min, max)
}
