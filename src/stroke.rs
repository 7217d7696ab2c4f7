//! Stroke and point tessellation.
//!
//! Strokes take one of two paths. Quad expansion turns every edge into a
//! [`LineGeometry`] quad extruded on the GPU, with cheap bevels at joints.
//! The outline path builds the literal stroke outline (segment rectangles,
//! joins and caps) as closed contours and triangulates their union into
//! [`FillGeometry`](crate::batch::FillGeometry).

use std::f32::consts::{PI, TAU};

use glam::Vec2;

use crate::attribs::AttribRegistry;
use crate::batch::{LineGeometry, LinePoint, PointGeometry, SegmentRef, VertexTransform};
use crate::config::TessConfig;
use crate::error::TessError;
use crate::raw::RawGeometry;
use crate::types::{Edge, EdgeKind, Rgba, StrokeCap, StrokeJoin, VertexAttrs, VertexCode};

/// How a shape's stroke is tessellated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrokePath {
    /// GPU-extruded quads.
    Quads,
    /// Triangulated outline contours.
    Outline,
}

/// Cap and join of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrokeStyle {
    /// End caps.
    pub cap: StrokeCap,
    /// Joins between segments.
    pub join: StrokeJoin,
}

impl StrokeStyle {
    /// Choose the path for a shape whose heaviest stroke is `weight`.
    #[must_use]
    pub fn path(&self, weight: f32, flat: bool, config: &TessConfig) -> StrokePath {
        let round = self.cap == StrokeCap::Round || self.join == StrokeJoin::Round;
        if weight < config.outline_weight_threshold || !flat || (!round && config.approximate_joins) {
            StrokePath::Quads
        } else {
            StrokePath::Outline
        }
    }
}

/// Heaviest stroke weight over all vertices.
#[must_use]
pub fn max_weight(raw: &RawGeometry) -> f32 {
    (0..raw.len())
        .map(|i| raw.vertex(i).stroke_weight)
        .fold(0.0, f32::max)
}

/// Expand every edge of `raw` into a line quad.
///
/// # Errors
///
/// [`TessError::CapacityExceeded`] when a quad cannot fit an empty block.
pub fn tessellate_quads(
    raw: &RawGeometry,
    lines: &mut LineGeometry,
    config: &TessConfig,
    transform: Option<&VertexTransform>,
) -> Result<usize, TessError> {
    let max = config.index_limit();
    let point = |i: u32| {
        let v = raw.vertex(i as usize);
        LinePoint {
            position: v.position,
            color: v.stroke,
        }
    };
    let mut prev: Option<SegmentRef> = None;
    let mut contour_first: Option<SegmentRef> = None;
    let mut bevels = 0;
    for edge in raw.edges() {
        let weight = raw.vertex(edge.a as usize).stroke_weight;
        let segment = lines.add_segment(point(edge.a), point(edge.b), weight, max, transform)?;
        if edge.kind.starts_contour() {
            contour_first = Some(segment);
        } else if config.bevel_joins {
            if let Some(p) = prev {
                bevels += usize::from(lines.add_bevel(p, segment));
            }
        }
        if edge.kind == EdgeKind::Close && config.bevel_joins {
            if let Some(first) = contour_first {
                bevels += usize::from(lines.add_bevel(segment, first));
            }
        }
        prev = Some(segment);
    }
    log::trace!("{} stroke quads, {bevels} bevels", raw.edges().len());
    Ok(raw.edges().len())
}

/// Expand every vertex of `raw` into a point sprite.
///
/// [`StrokeCap::Round`] gives round points, the other caps square ones.
///
/// # Errors
///
/// [`TessError::CapacityExceeded`] when one point cannot fit an empty
/// block.
pub fn tessellate_points(
    raw: &RawGeometry,
    cap: StrokeCap,
    points: &mut PointGeometry,
    config: &TessConfig,
    transform: Option<&VertexTransform>,
) -> Result<usize, TessError> {
    let max = config.index_limit();
    for i in 0..raw.len() {
        let v = raw.vertex(i);
        let center = transform.map_or(v.position, |t| t.point(v.position));
        match cap {
            StrokeCap::Round => {
                let segments = config.point_segments(v.stroke_weight);
                points.add_round(center, v.stroke, v.stroke_weight, segments, max)?;
            }
            StrokeCap::Square | StrokeCap::Butt => {
                points.add_square(center, v.stroke, v.stroke_weight, max)?;
            }
        }
    }
    Ok(raw.len())
}

/// Vertices needed in one block by the largest point of `raw`.
#[must_use]
pub fn point_block_size(raw: &RawGeometry, cap: StrokeCap, config: &TessConfig) -> usize {
    match cap {
        StrokeCap::Round => (0..raw.len())
            .map(|i| config.point_segments(raw.vertex(i).stroke_weight).max(3) + 1)
            .max()
            .unwrap_or(0),
        StrokeCap::Square | StrokeCap::Butt => 5,
    }
}

/// Builds outline contours into a raw store, one [`VertexCode::Break`]
/// between contours.
struct OutlineBuilder<'a> {
    out: RawGeometry,
    registry: &'a AttribRegistry,
    z: f32,
    round_detail: usize,
    miter_limit: f32,
}

impl OutlineBuilder<'_> {
    fn contour(&mut self, points: &[(Vec2, Rgba)]) {
        if points.len() < 3 {
            return;
        }
        let area: f32 = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|((a, _), (b, _))| a.perp_dot(*b))
            .sum();
        if area.abs() <= f32::EPSILON {
            return;
        }
        if !self.out.is_empty() {
            self.out.add_code(VertexCode::Break);
        }
        let mut emit = |&(p, color): &(Vec2, Rgba)| {
            let mut v = VertexAttrs::default().at([p.x, p.y, self.z]);
            v.fill = color;
            v.stroke = color;
            self.out.add_vertex(&v, &[], self.registry, VertexCode::Plain);
        };
        if area > 0.0 {
            points.iter().for_each(&mut emit);
        } else {
            points.iter().rev().for_each(&mut emit);
        }
    }

    #[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn arc_segments(&self, angle: f32) -> usize {
        ((self.round_detail as f32 * angle.abs() / PI).ceil() as usize).max(2)
    }

    #[expect(clippy::cast_precision_loss)]
    fn circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        let n = self.arc_segments(TAU);
        let points: Vec<_> = (0..n)
            .map(|k| {
                let angle = TAU * k as f32 / n as f32;
                (center + radius * Vec2::from_angle(angle), color)
            })
            .collect();
        self.contour(&points);
    }

    fn segment(&mut self, a: (Vec2, Rgba), b: (Vec2, Rgba), half: f32) {
        let d = b.0 - a.0;
        let Some(dir) = d.try_normalize() else {
            return;
        };
        let n = dir.perp() * half;
        self.contour(&[(a.0 + n, a.1), (b.0 + n, b.1), (b.0 - n, b.1), (a.0 - n, a.1)]);
    }

    #[expect(clippy::cast_precision_loss)]
    fn join(&mut self, join: StrokeJoin, p: Vec2, d0: Vec2, d1: Vec2, half: f32, color: Rgba) {
        let turn = d0.perp_dot(d1);
        if turn.abs() <= 1e-6 && d0.dot(d1) > 0.0 {
            return;
        }
        // The outer side is opposite the turn.
        let side = if turn > 0.0 { -1.0 } else { 1.0 };
        let n0 = d0.perp() * side;
        let n1 = d1.perp() * side;
        let o0 = p + n0 * half;
        let o1 = p + n1 * half;
        match join {
            StrokeJoin::Round => {
                let sweep = n0.angle_between(n1);
                let n = self.arc_segments(sweep);
                let mut points = vec![(p, color)];
                points.extend((0..=n).map(|k| {
                    let angle = sweep * k as f32 / n as f32;
                    (p + Vec2::from_angle(angle).rotate(n0) * half, color)
                }));
                self.contour(&points);
            }
            StrokeJoin::Miter => {
                let m = (n0 + n1).normalize_or_zero();
                let cos_half = m.dot(n0);
                if cos_half > 1e-6 && 1.0 / cos_half <= self.miter_limit {
                    let tip = p + m * (half / cos_half);
                    self.contour(&[(p, color), (o0, color), (tip, color), (o1, color)]);
                } else {
                    self.contour(&[(p, color), (o0, color), (o1, color)]);
                }
            }
            StrokeJoin::Bevel => self.contour(&[(p, color), (o0, color), (o1, color)]),
        }
    }

    fn cap(&mut self, cap: StrokeCap, p: Vec2, outward: Vec2, half: f32, color: Rgba) {
        match cap {
            StrokeCap::Butt => {}
            StrokeCap::Round => self.circle(p, half, color),
            StrokeCap::Square => {
                let Some(d) = outward.try_normalize() else {
                    return;
                };
                let n = d.perp() * half;
                let e = d * half;
                self.contour(&[
                    (p - n, color),
                    (p + n, color),
                    (p + n + e, color),
                    (p - n + e, color),
                ]);
            }
        }
    }
}

/// Build the stroke outline of `raw`'s edges as closed contours, all wound
/// counter-clockwise, for a non-zero fill.
///
/// Every outline vertex takes the fill and stroke color of the path vertex
/// it was offset from. The shape must be flat; z is taken from its first
/// vertex.
#[must_use]
pub fn build_outline(
    raw: &RawGeometry,
    style: StrokeStyle,
    config: &TessConfig,
    registry: &AttribRegistry,
) -> RawGeometry {
    let mut builder = OutlineBuilder {
        out: RawGeometry::new(),
        registry,
        z: if raw.is_empty() { 0.0 } else { raw.position(0)[2] },
        round_detail: config.round_join_detail.max(2),
        miter_limit: config.miter_limit,
    };
    let at = |i: u32| {
        let v = raw.vertex(i as usize);
        (Vec2::new(v.position[0], v.position[1]), v.stroke)
    };
    let half_of = |i: u32| raw.vertex(i as usize).stroke_weight / 2.0;
    let dir = |e: &Edge| (at(e.b).0 - at(e.a).0).normalize_or_zero();

    let edges = raw.edges();
    let mut run_start = 0;
    for (k, edge) in edges.iter().enumerate() {
        let half = half_of(edge.a);
        builder.segment(at(edge.a), at(edge.b), half);
        if edge.kind.starts_contour() {
            run_start = k;
        } else if k > 0 {
            let prev = &edges[k - 1];
            let (p, color) = at(edge.a);
            builder.join(style.join, p, dir(prev), dir(edge), half, color);
        }
        if edge.kind.ends_contour() {
            let first = &edges[run_start];
            if edge.kind == EdgeKind::Close {
                let (p, color) = at(first.a);
                builder.join(style.join, p, dir(edge), dir(first), half_of(first.a), color);
            } else {
                let (pa, ca) = at(first.a);
                let (pb, cb) = at(edge.b);
                builder.cap(style.cap, pa, -dir(first), half_of(first.a), ca);
                builder.cap(style.cap, pb, dir(edge), half_of(edge.b), cb);
            }
        }
    }
    builder.out
}
