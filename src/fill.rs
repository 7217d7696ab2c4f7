//! Polygon fill: packing vertices for the triangulator, unpacking and
//! blending what comes back, and expanding fixed primitives into raw index
//! lists.

use crate::attribs::{AttribRegistry, AttribType};
use crate::error::TriangulationError;
use crate::raw::{index_u32, RawGeometry, RawVertex};
use crate::triangulator::{PolygonTriangulator, PrimitiveKind, TriangulatorCallback, WindingRule};
use crate::types::{Material, Rgba, ShapeKind, VertexAttrs};

// Slot layout of a packed vertex.
const POSITION: usize = 0;
const FILL: usize = 3;
const NORMAL: usize = 7;
const TEXCOORD: usize = 10;
const STROKE: usize = 12;
const WEIGHT: usize = 16;
const AMBIENT: usize = 17;
const SPECULAR: usize = 21;
const EMISSIVE: usize = 25;
const SHININESS: usize = 29;
/// First slot of the generic attributes.
pub const GENERIC: usize = 30;

/// Packed width of one vertex under `registry`.
#[must_use]
pub fn packed_len(registry: &AttribRegistry) -> usize {
    GENERIC + registry.packed_width()
}

fn put_rgba(out: &mut Vec<f64>, c: Rgba) {
    out.extend(c.iter().map(|&x| f64::from(x)));
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn get_rgba(data: &[f64], at: usize) -> Rgba {
    std::array::from_fn(|k| data[at + k].round().clamp(0.0, 255.0) as u8)
}

#[expect(clippy::cast_possible_truncation)]
fn get_f32<const N: usize>(data: &[f64], at: usize) -> [f32; N] {
    std::array::from_fn(|k| data[at + k] as f32)
}

/// Pack vertex `i` of `raw` into `out`.
pub fn pack(raw: &RawGeometry, i: usize, registry: &AttribRegistry, out: &mut Vec<f64>) {
    let v = raw.vertex(i);
    out.clear();
    out.extend(v.position.iter().map(|&x| f64::from(x)));
    put_rgba(out, v.fill);
    out.extend(v.normal.iter().map(|&x| f64::from(x)));
    out.extend(v.texcoord.iter().map(|&x| f64::from(x)));
    put_rgba(out, v.stroke);
    out.push(f64::from(v.stroke_weight));
    put_rgba(out, v.material.ambient);
    put_rgba(out, v.material.specular);
    put_rgba(out, v.material.emissive);
    out.push(f64::from(v.material.shininess));
    for (k, format) in registry.formats().enumerate() {
        match raw.attrib(k) {
            Some(column) => column.pack(i, format.width(), out),
            None => out.extend(std::iter::repeat_n(0.0, format.width())),
        }
    }
}

/// Rebuild a vertex from its packed form.
///
/// # Errors
///
/// [`TriangulationError::MalformedVertex`] when `data` is shorter than the
/// layout requires.
pub(crate) fn unpack(data: &[f64], registry: &AttribRegistry) -> Result<RawVertex, TriangulationError> {
    let expected = packed_len(registry);
    if data.len() < expected {
        return Err(TriangulationError::MalformedVertex {
            found: data.len(),
            expected,
        });
    }
    #[expect(clippy::cast_possible_truncation)]
    let attrs = VertexAttrs {
        position: get_f32(data, POSITION),
        fill: get_rgba(data, FILL),
        normal: get_f32(data, NORMAL),
        texcoord: get_f32(data, TEXCOORD),
        stroke: get_rgba(data, STROKE),
        stroke_weight: data[WEIGHT] as f32,
        material: Material {
            ambient: get_rgba(data, AMBIENT),
            specular: get_rgba(data, SPECULAR),
            emissive: get_rgba(data, EMISSIVE),
            shininess: data[SHININESS] as f32,
        },
    };
    let mut at = GENERIC;
    let generic = registry
        .formats()
        .map(|format| {
            let mut values = [0.0; 4];
            values[..format.width()].copy_from_slice(&data[at..at + format.width()]);
            at += format.width();
            values
        })
        .collect();
    Ok(RawVertex { attrs, generic })
}

fn renormalize(data: &mut [f64]) {
    let len = data.iter().map(|x| x * x).sum::<f64>().sqrt();
    if len > 0.0 {
        for x in data {
            *x /= len;
        }
    }
}

/// Weighted blend of up to four packed vertices, placed at `position`.
///
/// Normal slots are renormalised, integer attributes rounded, and boolean
/// attributes copied from the heaviest source.
#[must_use]
pub fn combine(
    position: [f64; 3],
    sources: &[&[f64]],
    weights: &[f32],
    registry: &AttribRegistry,
) -> Vec<f64> {
    let len = packed_len(registry);
    let mut out = vec![0.0; len];
    for (source, &weight) in sources.iter().zip(weights).take(4) {
        for (slot, value) in out.iter_mut().zip(source.iter()) {
            *slot += f64::from(weight) * value;
        }
    }
    out[..3].copy_from_slice(&position);
    renormalize(&mut out[NORMAL..NORMAL + 3]);

    let heaviest = weights
        .iter()
        .take(sources.len().min(4))
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i);
    let mut at = GENERIC;
    for format in registry.formats() {
        let slots = at..at + format.width();
        match format.ty {
            AttribType::Float if format.is_normal_vector() => renormalize(&mut out[slots.clone()]),
            AttribType::Float => {}
            AttribType::Int => out[slots.clone()].iter_mut().for_each(|x| *x = x.round()),
            AttribType::Bool => {
                if let Some(source) = sources.get(heaviest) {
                    for k in slots.clone() {
                        out[k] = source.get(k).copied().unwrap_or(0.0);
                    }
                }
            }
        }
        at = slots.end;
    }
    out
}

/// Receives triangulator output into a scratch raw store plus raw indices.
pub(crate) struct FillCallback<'a> {
    registry: &'a AttribRegistry,
    pub(crate) scratch: RawGeometry,
    pub(crate) indices: Vec<u32>,
    kind: PrimitiveKind,
    primitive_start: usize,
    pub(crate) error: Option<TriangulationError>,
}

impl<'a> FillCallback<'a> {
    pub(crate) fn new(registry: &'a AttribRegistry) -> Self {
        Self {
            registry,
            scratch: RawGeometry::new(),
            indices: Vec::new(),
            kind: PrimitiveKind::List,
            primitive_start: 0,
            error: None,
        }
    }
}

impl TriangulatorCallback for FillCallback<'_> {
    fn begin(&mut self, kind: PrimitiveKind) {
        self.kind = kind;
        self.primitive_start = self.scratch.len();
    }

    fn vertex(&mut self, data: &[f64]) {
        match unpack(data, self.registry) {
            Ok(v) => {
                self.scratch.push_snapshot(&v, self.registry);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
    }

    fn combine(&mut self, position: [f64; 3], sources: &[&[f64]], weights: &[f32]) -> Vec<f64> {
        combine(position, sources, weights, self.registry)
    }

    fn end(&mut self) {
        let start = self.primitive_start;
        let count = self.scratch.len() - start;
        primitive_indices(self.kind, start, count, &mut self.indices);
    }

    fn error(&mut self, error: TriangulationError) {
        self.error.get_or_insert(error);
    }
}

/// Triangles of one triangulator primitive over vertices
/// `start..start + count`.
fn primitive_indices(kind: PrimitiveKind, start: usize, count: usize, out: &mut Vec<u32>) {
    let v = |k: usize| index_u32(start + k);
    match kind {
        PrimitiveKind::List => {
            for k in (0..count / 3 * 3).step_by(3) {
                out.extend([v(k), v(k + 1), v(k + 2)]);
            }
        }
        PrimitiveKind::Fan => {
            for k in 1..count.saturating_sub(1) {
                out.extend([v(0), v(k), v(k + 1)]);
            }
        }
        PrimitiveKind::Strip => {
            for k in 0..count.saturating_sub(2) {
                if k % 2 == 0 {
                    out.extend([v(k), v(k + 1), v(k + 2)]);
                } else {
                    out.extend([v(k + 1), v(k), v(k + 2)]);
                }
            }
        }
    }
}

/// Triangulated output of one polygon.
#[derive(Debug, Clone, Default)]
pub struct PolygonFill {
    /// Vertices as unpacked from the triangulator.
    pub vertices: RawGeometry,
    /// Triples of indices into `vertices`.
    pub indices: Vec<u32>,
}

/// Triangulate the contours of `raw` (a flattened store) with `rule`.
///
/// # Errors
///
/// Whatever the triangulator or the unpacking reported.
pub fn tessellate_polygon(
    raw: &RawGeometry,
    rule: WindingRule,
    triangulator: &mut dyn PolygonTriangulator,
    registry: &AttribRegistry,
) -> Result<PolygonFill, TriangulationError> {
    let mut callback = FillCallback::new(registry);
    let mut packed = Vec::with_capacity(packed_len(registry));
    triangulator.begin_polygon(rule);
    for contour in raw.contours() {
        triangulator.begin_contour();
        for i in contour {
            pack(raw, i, registry, &mut packed);
            triangulator.add_vertex(&packed);
        }
        triangulator.end_contour();
    }
    triangulator.end_polygon(&mut callback);
    match callback.error {
        Some(e) => Err(e),
        None => Ok(PolygonFill {
            vertices: callback.scratch,
            indices: callback.indices,
        }),
    }
}

/// Raw triangle indices for a fixed-topology shape of `n` vertices.
///
/// Polygons go through the triangulator instead; lines and points have no
/// fill.
#[must_use]
pub fn shape_indices(kind: ShapeKind, n: usize) -> Vec<u32> {
    let mut out = Vec::new();
    let v = index_u32;
    match kind {
        ShapeKind::Points | ShapeKind::Lines | ShapeKind::Polygon => {}
        ShapeKind::Triangles => primitive_indices(PrimitiveKind::List, 0, n, &mut out),
        ShapeKind::TriangleFan => primitive_indices(PrimitiveKind::Fan, 0, n, &mut out),
        ShapeKind::TriangleStrip => primitive_indices(PrimitiveKind::Strip, 0, n, &mut out),
        ShapeKind::Quads => {
            for q in (0..n / 4 * 4).step_by(4) {
                out.extend([v(q), v(q + 1), v(q + 2), v(q), v(q + 2), v(q + 3)]);
            }
        }
        ShapeKind::QuadStrip => {
            for q in 1..n / 2 {
                let (i0, i1, i2, i3) = (2 * q - 2, 2 * q - 1, 2 * q + 1, 2 * q);
                out.extend([v(i0), v(i1), v(i2), v(i0), v(i2), v(i3)]);
            }
        }
    }
    out
}
