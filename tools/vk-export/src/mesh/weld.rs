//! Vertex welding
//!
//! Triangle corners that produce bit-identical vertices share one index.

use hashbrown::HashMap;

use crate::error::GeometryError;
use crate::formats::{ArmatureJoint, Mesh, Vertex};

/// Hashable identity of a vertex. Floats are compared by bit pattern with
/// `-0.0` folded onto `0.0`, so welding matches numeric equality for every
/// value except NaN (NaNs weld only with the same payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    floats: [u32; 15],
    joint_ids: [i16; 4],
}

#[inline]
fn canonical_bits(v: f32) -> u32 {
    if v == 0.0 { 0 } else { v.to_bits() }
}

impl From<&Vertex> for VertexKey {
    fn from(v: &Vertex) -> Self {
        let mut floats = [0u32; 15];
        let values = v
            .position
            .iter()
            .chain(&v.normal)
            .chain(&v.tangent)
            .chain(&v.tex_coords)
            .chain(&v.joint_weights);
        for (slot, &value) in floats.iter_mut().zip(values) {
            *slot = canonical_bits(value);
        }
        Self {
            floats,
            joint_ids: v.joint_ids,
        }
    }
}

/// Builds deduplicated vertex and index buffers one triangle at a time.
#[derive(Debug, Default)]
pub struct VertexWelder {
    verts: Vec<Vertex>,
    tris: Vec<[u32; 3]>,
    lookup: HashMap<VertexKey, u32>,
    reverse_winding: bool,
}

impl VertexWelder {
    pub fn new(reverse_winding: bool) -> Self {
        Self {
            reverse_winding,
            ..Default::default()
        }
    }

    /// Index of `vertex`, appending it if no identical vertex exists yet
    pub fn weld(&mut self, vertex: Vertex) -> Result<u32, GeometryError> {
        let key = VertexKey::from(&vertex);
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }

        let index = u32::try_from(self.verts.len()).map_err(|_| {
            GeometryError::InvalidTopology("more than u32::MAX unique vertices".to_string())
        })?;
        self.verts.push(vertex);
        self.lookup.insert(key, index);
        Ok(index)
    }

    /// Weld three corners and emit the triangle, honouring winding reversal
    pub fn push_triangle(&mut self, corners: [Vertex; 3]) -> Result<[u32; 3], GeometryError> {
        let [a, b, c] = corners;
        let a = self.weld(a)?;
        let b = self.weld(b)?;
        let c = self.weld(c)?;

        let tri = if self.reverse_winding { [a, c, b] } else { [a, b, c] };
        self.tris.push(tri);
        Ok(tri)
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    pub fn finish(self, has_tangents: bool, joints: Vec<ArmatureJoint>) -> Mesh {
        Mesh {
            verts: self.verts,
            tris: self.tris,
            joints,
            has_tangents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> Vertex {
        Vertex {
            position: [x, 0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            tex_coords: [0.5, 0.5],
            ..Default::default()
        }
    }

    #[test]
    fn test_same_corner_welds() {
        let mut welder = VertexWelder::new(false);
        let a = welder.weld(vertex(1.0)).unwrap();
        let b = welder.weld(vertex(1.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(welder.vertex_count(), 1);
    }

    #[test]
    fn test_any_field_change_splits() {
        let base = vertex(1.0);
        let variants = [
            Vertex { normal: [0.0, 0.0, 1.0], ..base },
            Vertex { tangent: [1.0, 0.0, 0.0, 1.0], ..base },
            Vertex { tex_coords: [0.5, 0.25], ..base },
            Vertex { joint_ids: [0, -1, -1, -1], ..base },
            Vertex { joint_weights: [0.5, 0.0, 0.0], ..base },
        ];

        for variant in variants {
            let mut welder = VertexWelder::new(false);
            welder.weld(base).unwrap();
            assert_eq!(welder.weld(variant).unwrap(), 1, "{:?}", variant);
        }
    }

    #[test]
    fn test_negative_zero_welds() {
        let mut welder = VertexWelder::new(false);
        let a = welder.weld(vertex(0.0)).unwrap();
        let b = welder.weld(vertex(-0.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_winding() {
        let corners = [vertex(0.0), vertex(1.0), vertex(2.0)];

        let mut forward = VertexWelder::new(false);
        assert_eq!(forward.push_triangle(corners).unwrap(), [0, 1, 2]);

        let mut reversed = VertexWelder::new(true);
        assert_eq!(reversed.push_triangle(corners).unwrap(), [0, 2, 1]);
    }

    #[test]
    fn test_shared_edge_quad() {
        let mut welder = VertexWelder::new(false);
        welder
            .push_triangle([vertex(0.0), vertex(1.0), vertex(2.0)])
            .unwrap();
        welder
            .push_triangle([vertex(2.0), vertex(1.0), vertex(3.0)])
            .unwrap();

        let mesh = welder.finish(false, Vec::new());
        assert_eq!(mesh.verts.len(), 4);
        assert_eq!(mesh.tris, vec![[0, 1, 2], [2, 1, 3]]);
    }

    #[test]
    fn test_rewelding_output_is_identity() {
        let mut welder = VertexWelder::new(false);
        for i in 0..4 {
            let x = i as f32;
            welder
                .push_triangle([vertex(x), vertex(x + 1.0), vertex(x + 2.0)])
                .unwrap();
        }
        let first = welder.finish(false, Vec::new());

        let mut again = VertexWelder::new(false);
        for tri in &first.tris {
            again
                .push_triangle(tri.map(|i| first.verts[i as usize]))
                .unwrap();
        }
        let second = again.finish(false, Vec::new());
        assert_eq!(first, second);
    }
}
