//! The polygon triangulation boundary and its lyon-backed implementation.
//!
//! The tessellator never triangulates polygons itself. It hands contours to a
//! [`PolygonTriangulator`] as flat `f64` attribute vectors (position in
//! slots `0..3`) and receives triangles back through a
//! [`TriangulatorCallback`]. Vertices the engine synthesises at
//! intersections are built by the callback's
//! [`combine`](TriangulatorCallback::combine), so every attribute, not
//! just the position, survives triangulation.

use lyon::math::point;
use lyon::path::{EndpointId, Path};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, VertexBuffers,
    VertexSource,
};

use crate::error::TriangulationError;

/// Which regions of overlapping contours count as inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindingRule {
    /// Inside where the winding number is not zero.
    #[default]
    NonZero,
    /// Inside where the winding number is odd.
    Odd,
}

/// How the vertices between `begin` and `end` form triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// A fan around the first vertex.
    Fan,
    /// A strip; each vertex forms a triangle with the previous two.
    Strip,
    /// Independent triangles, three vertices each.
    List,
}

/// Receives the output of a [`PolygonTriangulator`].
pub trait TriangulatorCallback {
    /// A primitive starts.
    fn begin(&mut self, kind: PrimitiveKind);

    /// One vertex of the current primitive: either a vector passed to
    /// [`PolygonTriangulator::add_vertex`] or one returned by
    /// [`combine`](Self::combine).
    fn vertex(&mut self, data: &[f64]);

    /// Synthesise a vertex at `position` as the weighted blend of up to
    /// four source vectors.
    fn combine(&mut self, position: [f64; 3], sources: &[&[f64]], weights: &[f32]) -> Vec<f64>;

    /// The current primitive is complete.
    fn end(&mut self);

    /// The engine rejected the polygon; no further calls follow.
    fn error(&mut self, error: TriangulationError);
}

/// A polygon triangulation engine.
pub trait PolygonTriangulator {
    /// Start a polygon filled with `rule`.
    fn begin_polygon(&mut self, rule: WindingRule);
    /// Start a contour of the current polygon.
    fn begin_contour(&mut self);
    /// Add a vertex to the current contour; `data[0..3]` is the position.
    fn add_vertex(&mut self, data: &[f64]);
    /// Close the current contour.
    fn end_contour(&mut self);
    /// Triangulate everything since [`begin_polygon`](Self::begin_polygon)
    /// and report it to `callback`.
    fn end_polygon(&mut self, callback: &mut dyn TriangulatorCallback);
}

/// Output vertex of the lyon pass: the 2D position plus where it came from.
#[derive(Debug, Clone)]
struct SourcedVertex {
    position: [f32; 2],
    sources: Vec<VertexSource>,
}

/// Result of one lyon pass.
struct LyonOutput {
    vertices: Vec<SourcedVertex>,
    indices: Vec<u32>,
    /// Input vertex for each lyon endpoint id.
    endpoints: Vec<usize>,
    /// Kept axes, then the dropped one.
    axes: (usize, usize, usize),
}

/// [`PolygonTriangulator`] on top of lyon's fill tessellator.
///
/// Contours are projected onto the coordinate plane most perpendicular to
/// their Newell normal, so planar polygons in any orientation triangulate
/// correctly.
pub struct LyonTriangulator {
    rule: WindingRule,
    vertices: Vec<Vec<f64>>,
    contours: Vec<std::ops::Range<usize>>,
    open: Option<usize>,
    fault: Option<TriangulationError>,
    tessellator: FillTessellator,
}

impl Default for LyonTriangulator {
    fn default() -> Self {
        Self {
            rule: WindingRule::default(),
            vertices: Vec::new(),
            contours: Vec::new(),
            open: None,
            fault: None,
            tessellator: FillTessellator::new(),
        }
    }
}

impl std::fmt::Debug for LyonTriangulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LyonTriangulator")
            .field("rule", &self.rule)
            .field("vertices", &self.vertices.len())
            .field("contours", &self.contours)
            .finish_non_exhaustive()
    }
}

impl LyonTriangulator {
    /// A triangulator with empty scratch state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.vertices.clear();
        self.contours.clear();
        self.open = None;
        self.fault = None;
    }

    /// The two coordinate axes kept when projecting to 2D.
    fn projection_axes(&self) -> (usize, usize, usize) {
        let mut normal = [0.0f64; 3];
        for contour in &self.contours {
            let ring = &self.vertices[contour.clone()];
            for (i, a) in ring.iter().enumerate() {
                let b = &ring[(i + 1) % ring.len()];
                normal[0] += (a[1] - b[1]) * (a[2] + b[2]);
                normal[1] += (a[2] - b[2]) * (a[0] + b[0]);
                normal[2] += (a[0] - b[0]) * (a[1] + b[1]);
            }
        }
        let [nx, ny, nz] = normal.map(f64::abs);
        if nx > ny && nx > nz {
            (1, 2, 0)
        } else if ny > nz {
            (2, 0, 1)
        } else {
            (0, 1, 2)
        }
    }

    fn triangulate(&mut self) -> Result<LyonOutput, TriangulationError> {
        let axes = self.projection_axes();
        let (u, v, _) = axes;
        let mut builder = Path::builder();
        let mut endpoints: Vec<usize> = Vec::with_capacity(self.vertices.len());
        let mut record = |id: EndpointId, vertex: usize| {
            let slot = id.to_usize();
            if endpoints.len() <= slot {
                endpoints.resize(slot + 1, usize::MAX);
            }
            endpoints[slot] = vertex;
        };
        for contour in &self.contours {
            if contour.is_empty() {
                continue;
            }
            for vertex in contour.clone() {
                let data = &self.vertices[vertex];
                #[expect(clippy::cast_possible_truncation)]
                let at = point(data[u] as f32, data[v] as f32);
                let id = if vertex == contour.start {
                    builder.begin(at)
                } else {
                    builder.line_to(at)
                };
                record(id, vertex);
            }
            builder.end(true);
        }
        let path = builder.build();

        let fill_rule = match self.rule {
            WindingRule::NonZero => FillRule::NonZero,
            WindingRule::Odd => FillRule::EvenOdd,
        };
        let mut buffers: VertexBuffers<SourcedVertex, u32> = VertexBuffers::new();
        self.tessellator
            .tessellate_with_ids(
                path.id_iter(),
                &path,
                None,
                &FillOptions::tolerance(0.01).with_fill_rule(fill_rule),
                &mut BuffersBuilder::new(&mut buffers, |vertex: FillVertex| SourcedVertex {
                    position: vertex.position().to_array(),
                    sources: vertex.sources().collect(),
                }),
            )
            .map_err(|e| TriangulationError::Engine(format!("{e:?}")))?;
        Ok(LyonOutput {
            vertices: buffers.vertices,
            indices: buffers.indices,
            endpoints,
            axes,
        })
    }
}

impl PolygonTriangulator for LyonTriangulator {
    fn begin_polygon(&mut self, rule: WindingRule) {
        self.reset();
        self.rule = rule;
    }

    fn begin_contour(&mut self) {
        if self.open.is_some() {
            self.fault.get_or_insert(TriangulationError::ContourNesting);
        }
        self.open = Some(self.vertices.len());
    }

    fn add_vertex(&mut self, data: &[f64]) {
        if self.open.is_none() {
            self.fault.get_or_insert(TriangulationError::ContourNesting);
            return;
        }
        if data.len() < 3 {
            self.fault.get_or_insert(TriangulationError::MalformedVertex {
                found: data.len(),
                expected: 3,
            });
            return;
        }
        if data[..3].iter().any(|c| !c.is_finite()) {
            self.fault
                .get_or_insert(TriangulationError::Engine("non-finite vertex position".into()));
            return;
        }
        self.vertices.push(data.to_vec());
    }

    fn end_contour(&mut self) {
        match self.open.take() {
            Some(start) => self.contours.push(start..self.vertices.len()),
            None => {
                self.fault.get_or_insert(TriangulationError::ContourNesting);
            }
        }
    }

    fn end_polygon(&mut self, callback: &mut dyn TriangulatorCallback) {
        if self.open.is_some() {
            self.fault.get_or_insert(TriangulationError::ContourNesting);
        }
        if let Some(fault) = self.fault.take() {
            callback.error(fault);
            self.reset();
            return;
        }
        let LyonOutput {
            vertices: output,
            indices,
            endpoints,
            axes: (u, v, w),
        } = match self.triangulate() {
            Ok(result) => result,
            Err(e) => {
                callback.error(e);
                self.reset();
                return;
            }
        };
        if indices.is_empty() {
            self.reset();
            return;
        }

        let resolved: Vec<Vec<f64>> = output
            .iter()
            .map(|out| {
                if let [VertexSource::Endpoint { id }] = out.sources[..] {
                    return self.vertices[endpoints[id.to_usize()]].clone();
                }
                let blend = blend_weights(&out.sources, &endpoints);
                let mut position = [0.0; 3];
                position[u] = f64::from(out.position[0]);
                position[v] = f64::from(out.position[1]);
                position[w] = blend
                    .iter()
                    .map(|&(vertex, weight)| self.vertices[vertex][w] * f64::from(weight))
                    .sum();
                let sources: Vec<&[f64]> = blend.iter().map(|&(i, _)| self.vertices[i].as_slice()).collect();
                let weights: Vec<f32> = blend.iter().map(|&(_, weight)| weight).collect();
                callback.combine(position, &sources, &weights)
            })
            .collect();

        log::trace!(
            "triangulated {} contours into {} triangles ({} synthesised vertices)",
            self.contours.len(),
            indices.len() / 3,
            output.iter().filter(|o| o.sources.len() != 1).count()
        );
        callback.begin(PrimitiveKind::List);
        for index in indices {
            callback.vertex(&resolved[index as usize]);
        }
        callback.end();
        self.reset();
    }
}

/// Up to four `(vertex, weight)` pairs summing to one.
fn blend_weights(sources: &[VertexSource], endpoints: &[usize]) -> Vec<(usize, f32)> {
    #[expect(clippy::cast_precision_loss)]
    let share = 1.0 / sources.len().max(1) as f32;
    let mut blend: Vec<(usize, f32)> = Vec::with_capacity(4);
    let mut add = |vertex: usize, weight: f32| {
        match blend.iter_mut().find(|(v, _)| *v == vertex) {
            Some(entry) => entry.1 += weight,
            None => blend.push((vertex, weight)),
        }
    };
    for source in sources {
        match *source {
            VertexSource::Endpoint { id } => add(endpoints[id.to_usize()], share),
            VertexSource::Edge { from, to, t } => {
                add(endpoints[from.to_usize()], share * (1.0 - t));
                add(endpoints[to.to_usize()], share * t);
            }
        }
    }
    blend.sort_by(|a, b| b.1.total_cmp(&a.1));
    blend.truncate(4);
    let total: f32 = blend.iter().map(|(_, weight)| weight).sum();
    if total > 0.0 {
        for entry in &mut blend {
            entry.1 /= total;
        }
    }
    blend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        triangles: Vec<[[f64; 3]; 3]>,
        pending: Vec<[f64; 3]>,
        kinds: Vec<PrimitiveKind>,
        combined: usize,
        errors: Vec<TriangulationError>,
    }

    impl TriangulatorCallback for Collect {
        fn begin(&mut self, kind: PrimitiveKind) {
            self.kinds.push(kind);
        }

        fn vertex(&mut self, data: &[f64]) {
            self.pending.push([data[0], data[1], data[2]]);
            if self.pending.len() == 3 {
                let tri = [self.pending[0], self.pending[1], self.pending[2]];
                self.triangles.push(tri);
                self.pending.clear();
            }
        }

        fn combine(&mut self, position: [f64; 3], sources: &[&[f64]], weights: &[f32]) -> Vec<f64> {
            assert!(sources.len() <= 4 && sources.len() == weights.len());
            self.combined += 1;
            position.to_vec()
        }

        fn end(&mut self) {}

        fn error(&mut self, error: TriangulationError) {
            self.errors.push(error);
        }
    }

    fn area(triangles: &[[[f64; 3]; 3]]) -> f64 {
        triangles
            .iter()
            .map(|[a, b, c]| {
                ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs() / 2.0
            })
            .sum()
    }

    fn contour(t: &mut LyonTriangulator, points: &[[f64; 3]]) {
        t.begin_contour();
        for p in points {
            t.add_vertex(p);
        }
        t.end_contour();
    }

    #[test]
    fn square_gives_two_triangles() {
        let mut t = LyonTriangulator::new();
        let mut out = Collect::default();
        t.begin_polygon(WindingRule::NonZero);
        contour(&mut t, &[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [10.0, 10.0, 0.0], [0.0, 10.0, 0.0]]);
        t.end_polygon(&mut out);
        assert_eq!(out.kinds, [PrimitiveKind::List]);
        assert_eq!(out.triangles.len(), 2);
        assert!((area(&out.triangles) - 100.0).abs() < 1e-6);
        assert_eq!(out.combined, 0);
    }

    #[test]
    fn vertical_polygon_is_projected() {
        let mut t = LyonTriangulator::new();
        let mut out = Collect::default();
        t.begin_polygon(WindingRule::NonZero);
        contour(&mut t, &[[0.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 10.0, 10.0], [0.0, 0.0, 10.0]]);
        t.end_polygon(&mut out);
        assert_eq!(out.triangles.len(), 2);
        assert!(out.triangles.iter().flatten().all(|p| p[0] == 0.0));
    }

    #[test]
    fn self_intersection_combines_vertices() {
        let mut t = LyonTriangulator::new();
        let mut out = Collect::default();
        t.begin_polygon(WindingRule::NonZero);
        // A bow tie crossing at (5, 5).
        contour(&mut t, &[[0.0, 0.0, 0.0], [10.0, 10.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        t.end_polygon(&mut out);
        assert!(out.combined >= 1);
        assert!((area(&out.triangles) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn unbalanced_contours_report_an_error() {
        let mut t = LyonTriangulator::new();
        let mut out = Collect::default();
        t.begin_polygon(WindingRule::Odd);
        t.begin_contour();
        t.add_vertex(&[0.0, 0.0, 0.0]);
        t.end_polygon(&mut out);
        assert_eq!(out.errors, [TriangulationError::ContourNesting]);
        assert!(out.triangles.is_empty());
    }

    #[test]
    fn short_vertices_are_malformed() {
        let mut t = LyonTriangulator::new();
        let mut out = Collect::default();
        t.begin_polygon(WindingRule::NonZero);
        contour(&mut t, &[[0.0, 0.0, 0.0]]);
        t.begin_contour();
        t.add_vertex(&[1.0]);
        t.end_contour();
        t.end_polygon(&mut out);
        assert!(matches!(out.errors[..], [TriangulationError::MalformedVertex { found: 1, expected: 3 }]));
    }

    #[test]
    fn blend_weights_are_normalised_and_capped() {
        let endpoints = [0, 1, 2, 3, 4, 5];
        let id = |i: u32| EndpointId(i);
        let sources = [
            VertexSource::Edge { from: id(0), to: id(1), t: 0.5 },
            VertexSource::Edge { from: id(2), to: id(3), t: 0.25 },
            VertexSource::Edge { from: id(4), to: id(5), t: 0.1 },
        ];
        let blend = blend_weights(&sources, &endpoints);
        assert_eq!(blend.len(), 4);
        let total: f32 = blend.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(blend[0].0, 4);
    }
}
