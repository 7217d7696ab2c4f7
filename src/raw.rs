//! The raw geometry store: vertices exactly as the user submitted them.
//!
//! A [`RawGeometry`] holds one shape: column arrays for every vertex
//! attribute, the command codes that say how consecutive vertices are to be
//! interpreted (plain, curve control points, contour breaks), and, once the
//! shape has been flattened, the stroke edges.

use std::ops::Range;

use crate::attribs::{AttribData, AttribRegistry, AttribType};
use crate::types::{Edge, EdgeKind, Material, Rgba, ShapeKind, VertexAttrs, VertexCode};

/// One vertex copied out of a store, built-in and generic attributes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawVertex {
    pub attrs: VertexAttrs,
    pub generic: Vec<[f64; 4]>,
}

impl RawVertex {
    /// Linear blend of `self` and `other` at `t`, placed at `position`.
    ///
    /// Integer attributes are rounded and booleans take the nearer value.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn lerp(&self, other: &Self, t: f32, position: [f32; 3], registry: &AttribRegistry) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        let mix_rgba = |a: Rgba, b: Rgba| -> Rgba {
            std::array::from_fn(|k| mix(f32::from(a[k]), f32::from(b[k])).round().clamp(0.0, 255.0) as u8)
        };
        let (a, b) = (&self.attrs, &other.attrs);
        let attrs = VertexAttrs {
            position,
            fill: mix_rgba(a.fill, b.fill),
            normal: std::array::from_fn(|k| mix(a.normal[k], b.normal[k])),
            texcoord: std::array::from_fn(|k| mix(a.texcoord[k], b.texcoord[k])),
            stroke: mix_rgba(a.stroke, b.stroke),
            stroke_weight: mix(a.stroke_weight, b.stroke_weight),
            material: Material {
                ambient: mix_rgba(a.material.ambient, b.material.ambient),
                specular: mix_rgba(a.material.specular, b.material.specular),
                emissive: mix_rgba(a.material.emissive, b.material.emissive),
                shininess: mix(a.material.shininess, b.material.shininess),
            },
        };
        let t64 = f64::from(t);
        let generic = registry
            .formats()
            .zip(self.generic.iter().zip(&other.generic))
            .map(|(format, (va, vb))| match format.ty {
                AttribType::Bool => {
                    if t < 0.5 {
                        *va
                    } else {
                        *vb
                    }
                }
                AttribType::Float | AttribType::Int => {
                    std::array::from_fn(|k| va[k] + (vb[k] - va[k]) * t64)
                }
            })
            .collect();
        Self { attrs, generic }
    }
}

/// Vertices, codes and edges of one shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGeometry {
    pub(crate) positions: Vec<[f32; 3]>,
    pub(crate) fills: Vec<Rgba>,
    pub(crate) normals: Vec<[f32; 3]>,
    pub(crate) texcoords: Vec<[f32; 2]>,
    pub(crate) strokes: Vec<Rgba>,
    pub(crate) stroke_weights: Vec<f32>,
    pub(crate) materials: Vec<Material>,
    pub(crate) attribs: Vec<AttribData>,
    pub(crate) codes: Vec<VertexCode>,
    pub(crate) edges: Vec<Edge>,
}

impl RawGeometry {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the store holds no vertex.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Remove every vertex, code and edge, keeping allocations.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.fills.clear();
        self.normals.clear();
        self.texcoords.clear();
        self.strokes.clear();
        self.stroke_weights.clear();
        self.materials.clear();
        for column in &mut self.attribs {
            column.clear();
        }
        self.codes.clear();
        self.edges.clear();
    }

    /// Command codes in submission order.
    #[must_use]
    pub fn codes(&self) -> &[VertexCode] {
        &self.codes
    }

    /// Stroke edges.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Position of vertex `i`.
    #[must_use]
    pub fn position(&self, i: usize) -> [f32; 3] {
        self.positions[i]
    }

    /// Built-in attributes of vertex `i`.
    #[must_use]
    pub fn vertex(&self, i: usize) -> VertexAttrs {
        VertexAttrs {
            position: self.positions[i],
            fill: self.fills[i],
            normal: self.normals[i],
            texcoord: self.texcoords[i],
            stroke: self.strokes[i],
            stroke_weight: self.stroke_weights[i],
            material: self.materials[i],
        }
    }

    /// Generic attribute column `index`, if declared when vertices were
    /// added.
    #[must_use]
    pub fn attrib(&self, index: usize) -> Option<&AttribData> {
        self.attribs.get(index)
    }

    /// Overwrite the built-in attributes of vertex `i`.
    pub fn set_vertex(&mut self, i: usize, v: &VertexAttrs) {
        self.positions[i] = v.position;
        self.fills[i] = v.fill;
        self.normals[i] = v.normal;
        self.texcoords[i] = v.texcoord;
        self.strokes[i] = v.stroke;
        self.stroke_weights[i] = v.stroke_weight;
        self.materials[i] = v.material;
    }

    /// Whether every vertex lies in one plane of constant z.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.positions
            .first()
            .is_none_or(|first| self.positions.iter().all(|p| p[2] == first[2]))
    }

    /// Create columns for attributes declared after this store was filled.
    pub(crate) fn sync_attribs(&mut self, registry: &AttribRegistry) {
        let len = self.len();
        for format in registry.formats().skip(self.attribs.len()) {
            let mut column = AttribData::new(format.ty);
            for _ in 0..len {
                column.push_packed(&[], format.width());
            }
            self.attribs.push(column);
        }
    }

    /// Append a command code.
    pub fn add_code(&mut self, code: VertexCode) {
        self.codes.push(code);
    }

    /// Append one vertex without a code; returns its index.
    pub fn push_vertex(
        &mut self,
        v: &VertexAttrs,
        generic: &[[f64; 4]],
        registry: &AttribRegistry,
    ) -> u32 {
        self.sync_attribs(registry);
        self.positions.push(v.position);
        self.fills.push(v.fill);
        self.normals.push(v.normal);
        self.texcoords.push(v.texcoord);
        self.strokes.push(v.stroke);
        self.stroke_weights.push(v.stroke_weight);
        self.materials.push(v.material);
        for (k, (column, format)) in self.attribs.iter_mut().zip(registry.formats()).enumerate() {
            let values = generic.get(k).copied().unwrap_or_default();
            column.push_packed(&values, format.width());
        }
        index_u32(self.len() - 1)
    }

    /// Append a vertex with a code that consumes exactly one vertex.
    pub fn add_vertex(
        &mut self,
        v: &VertexAttrs,
        generic: &[[f64; 4]],
        registry: &AttribRegistry,
        code: VertexCode,
    ) -> u32 {
        debug_assert_eq!(code.vertex_count(), 1);
        self.codes.push(code);
        self.push_vertex(v, generic, registry)
    }

    /// Copy vertex `i` out of the store.
    pub(crate) fn snapshot(&self, i: usize, registry: &AttribRegistry) -> RawVertex {
        let mut generic = Vec::with_capacity(registry.len());
        let mut scratch = Vec::with_capacity(4);
        for (column, format) in self.attribs.iter().zip(registry.formats()) {
            scratch.clear();
            column.pack(i, format.width(), &mut scratch);
            let mut values = [0.0; 4];
            values[..scratch.len()].copy_from_slice(&scratch);
            generic.push(values);
        }
        RawVertex {
            attrs: self.vertex(i),
            generic,
        }
    }

    /// Append a snapshot; returns its index.
    pub(crate) fn push_snapshot(&mut self, v: &RawVertex, registry: &AttribRegistry) -> u32 {
        self.push_vertex(&v.attrs, &v.generic, registry)
    }

    /// Vertex ranges of the contours of a flattened store.
    ///
    /// Only meaningful once every code is [`VertexCode::Plain`] or
    /// [`VertexCode::Break`]; a store without codes is one contour.
    #[must_use]
    pub fn contours(&self) -> Vec<Range<usize>> {
        if self.codes.is_empty() {
            return if self.is_empty() {
                Vec::new()
            } else {
                vec![0..self.len()]
            };
        }
        let mut contours = Vec::new();
        let mut start = 0;
        let mut cursor = 0;
        for code in &self.codes {
            if *code == VertexCode::Break {
                if cursor > start {
                    contours.push(start..cursor);
                }
                start = cursor;
            }
            cursor += code.vertex_count();
        }
        if cursor > start {
            contours.push(start..cursor.min(self.len()));
        }
        contours
    }

    /// Build the stroke edges for a flattened shape of kind `kind`.
    pub(crate) fn build_edges(&mut self, kind: ShapeKind, close: bool) {
        self.edges.clear();
        let n = index_u32(self.len());
        match kind {
            ShapeKind::Points => {}
            ShapeKind::Lines => {
                for i in (0..n.saturating_sub(1)).step_by(2) {
                    self.push_edge(i, i + 1, EdgeKind::Isolated);
                }
            }
            ShapeKind::Triangles => {
                for i in (0..n.saturating_sub(2)).step_by(3) {
                    self.add_loop(&[i, i + 1, i + 2]);
                }
            }
            ShapeKind::TriangleFan => {
                for i in 1..n.saturating_sub(1) {
                    self.add_loop(&[0, i, i + 1]);
                }
            }
            ShapeKind::TriangleStrip => {
                for i in 1..n.saturating_sub(1) {
                    if i % 2 == 0 {
                        self.add_loop(&[i, i - 1, i + 1]);
                    } else {
                        self.add_loop(&[i, i + 1, i - 1]);
                    }
                }
            }
            ShapeKind::Quads => {
                for i in (0..n.saturating_sub(3)).step_by(4) {
                    self.add_loop(&[i, i + 1, i + 2, i + 3]);
                }
            }
            ShapeKind::QuadStrip => {
                for q in 1..n / 2 {
                    let (i0, i1) = (2 * (q - 1), 2 * (q - 1) + 1);
                    let (i2, i3) = (2 * q + 1, 2 * q);
                    self.add_loop(&[i0, i1, i2, i3]);
                }
            }
            ShapeKind::Polygon => {
                for contour in self.contours() {
                    let ids: Vec<u32> = contour.map(index_u32).collect();
                    self.add_path(&ids, close);
                }
            }
        }
    }

    fn push_edge(&mut self, a: u32, b: u32, kind: EdgeKind) {
        self.edges.push(Edge { a, b, kind });
    }

    fn add_loop(&mut self, ids: &[u32]) {
        self.add_path(ids, true);
    }

    fn add_path(&mut self, ids: &[u32], close: bool) {
        match ids.len() {
            0 | 1 => {}
            2 => self.push_edge(ids[0], ids[1], EdgeKind::Isolated),
            len => {
                let segments = len - 1;
                for (k, pair) in ids.windows(2).enumerate() {
                    let kind = if k == 0 {
                        EdgeKind::Start
                    } else if k == segments - 1 && !close {
                        EdgeKind::End
                    } else {
                        EdgeKind::Middle
                    };
                    self.push_edge(pair[0], pair[1], kind);
                }
                if close {
                    self.push_edge(ids[len - 1], ids[0], EdgeKind::Close);
                }
            }
        }
    }
}

/// Convert a vertex index to the `u32` used by raw index lists, saturating.
pub(crate) fn index_u32(i: usize) -> u32 {
    u32::try_from(i).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> RawGeometry {
        let registry = AttribRegistry::new();
        let mut raw = RawGeometry::new();
        for i in 0..n {
            #[expect(clippy::cast_precision_loss)]
            let x = i as f32;
            raw.add_vertex(
                &VertexAttrs::default().at([x, 0.0, 0.0]),
                &[],
                &registry,
                VertexCode::Plain,
            );
        }
        raw
    }

    #[test]
    fn open_polygon_edges_have_start_and_end() {
        let mut raw = store_with(4);
        raw.build_edges(ShapeKind::Polygon, false);
        let kinds: Vec<_> = raw.edges().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [EdgeKind::Start, EdgeKind::Middle, EdgeKind::End]);
    }

    #[test]
    fn closed_polygon_edges_end_with_close() {
        let mut raw = store_with(3);
        raw.build_edges(ShapeKind::Polygon, true);
        let edges = raw.edges();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2], Edge { a: 2, b: 0, kind: EdgeKind::Close });
    }

    #[test]
    fn breaks_split_contours() {
        let registry = AttribRegistry::new();
        let mut raw = store_with(3);
        raw.add_code(VertexCode::Break);
        for _ in 0..3 {
            raw.add_vertex(&VertexAttrs::default(), &[], &registry, VertexCode::Plain);
        }
        assert_eq!(raw.contours(), vec![0..3, 3..6]);
        raw.build_edges(ShapeKind::Polygon, true);
        assert_eq!(raw.edges().len(), 6);
    }

    #[test]
    fn lines_pair_vertices_into_isolated_edges() {
        let mut raw = store_with(5);
        raw.build_edges(ShapeKind::Lines, false);
        assert_eq!(raw.edges().len(), 2);
        assert!(raw.edges().iter().all(|e| e.kind == EdgeKind::Isolated));
    }

    #[test]
    fn late_attributes_are_backfilled() {
        use crate::attribs::{AttribFormat, AttribKind};

        let mut raw = store_with(2);
        let mut registry = AttribRegistry::new();
        registry
            .define("w", AttribFormat::new(AttribKind::Other, AttribType::Float, 1))
            .unwrap_or_else(|e| panic!("{e}"));
        raw.push_vertex(&VertexAttrs::default(), &[[5.0, 0.0, 0.0, 0.0]], &registry);
        assert_eq!(raw.attrib(0), Some(&AttribData::Float(vec![0.0, 0.0, 5.0])));
    }

    #[test]
    fn lerp_interpolates_colors_and_rounds() {
        let registry = AttribRegistry::new();
        let mut a = VertexAttrs::default();
        a.fill = [0, 0, 0, 255];
        let mut b = a;
        b.fill = [255, 100, 0, 255];
        let va = RawVertex { attrs: a, generic: Vec::new() };
        let vb = RawVertex { attrs: b, generic: Vec::new() };
        let mid = va.lerp(&vb, 0.5, [1.0, 2.0, 3.0], &registry);
        assert_eq!(mid.attrs.fill, [128, 50, 0, 255]);
        assert_eq!(mid.attrs.position, [1.0, 2.0, 3.0]);
    }
}
