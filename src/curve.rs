//! Curve flattening by forward differencing.
//!
//! Cubic Béziers, quadratics (promoted to cubics) and Catmull-Rom spans are
//! all evaluated through one cubic forward-difference recurrence: a 4×4
//! basis matrix turns the four control points into polynomial coefficients,
//! after which every step costs three vector additions.

use crate::attribs::AttribRegistry;
use crate::config::TessConfig;
use crate::raw::{RawGeometry, RawVertex};
use crate::types::VertexCode;

/// Basis of a cubic Bézier, rows are the `t³, t², t, 1` coefficients.
pub const BEZIER_BASIS: [[f32; 4]; 4] = [
    [-1.0, 3.0, -3.0, 1.0],
    [3.0, -6.0, 3.0, 0.0],
    [-3.0, 3.0, 0.0, 0.0],
    [1.0, 0.0, 0.0, 0.0],
];

/// Catmull-Rom basis with tightness `s`; `s = 0` is the classic spline.
///
/// A span built from `P0..P3` runs from `P1` to `P2` for every `s`.
#[must_use]
pub fn catmull_rom_basis(s: f32) -> [[f32; 4]; 4] {
    [
        [(s - 1.0) / 2.0, (s + 3.0) / 2.0, (-3.0 - s) / 2.0, (1.0 - s) / 2.0],
        [1.0 - s, (-5.0 - s) / 2.0, s + 2.0, (s - 1.0) / 2.0],
        [(s - 1.0) / 2.0, 0.0, (1.0 - s) / 2.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
    ]
}

/// Iterator over `detail` evenly parameterised points of one cubic span,
/// excluding the span's start and ending exactly on `end`.
#[derive(Debug, Clone)]
pub struct ForwardDifferences {
    point: [f32; 3],
    d1: [f32; 3],
    d2: [f32; 3],
    d3: [f32; 3],
    end: [f32; 3],
    step: usize,
    detail: usize,
}

impl ForwardDifferences {
    /// Set up the recurrence for `controls` under `basis`.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn new(basis: &[[f32; 4]; 4], controls: [[f32; 3]; 4], end: [f32; 3], detail: usize) -> Self {
        let detail = detail.max(1);
        let coeff = |row: usize, axis: usize| -> f32 {
            (0..4).map(|j| basis[row][j] * controls[j][axis]).sum()
        };
        let h = 1.0 / detail as f32;
        let (h2, h3) = (h * h, h * h * h);
        let mut point = [0.0; 3];
        let mut d1 = [0.0; 3];
        let mut d2 = [0.0; 3];
        let mut d3 = [0.0; 3];
        for axis in 0..3 {
            let (a, b, c, d) = (coeff(0, axis), coeff(1, axis), coeff(2, axis), coeff(3, axis));
            point[axis] = d;
            d1[axis] = a * h3 + b * h2 + c * h;
            d2[axis] = 6.0 * a * h3 + 2.0 * b * h2;
            d3[axis] = 6.0 * a * h3;
        }
        Self {
            point,
            d1,
            d2,
            d3,
            end,
            step: 0,
            detail,
        }
    }
}

impl Iterator for ForwardDifferences {
    /// Curve parameter and position.
    type Item = (f32, [f32; 3]);

    #[expect(clippy::cast_precision_loss)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.step == self.detail {
            return None;
        }
        self.step += 1;
        for axis in 0..3 {
            self.point[axis] += self.d1[axis];
            self.d1[axis] += self.d2[axis];
            self.d2[axis] += self.d3[axis];
        }
        if self.step == self.detail {
            return Some((1.0, self.end));
        }
        Some((self.step as f32 / self.detail as f32, self.point))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.detail - self.step;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ForwardDifferences {}

/// Expands curve codes of a raw store into plain vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveFlattener {
    bezier_detail: usize,
    curve_detail: usize,
    curve_basis: [[f32; 4]; 4],
}

impl CurveFlattener {
    /// A flattener using the detail levels and tightness of `config`.
    #[must_use]
    pub fn new(config: &TessConfig) -> Self {
        Self {
            bezier_detail: config.bezier_detail.max(1),
            curve_detail: config.curve_detail.max(1),
            curve_basis: catmull_rom_basis(config.curve_tightness),
        }
    }

    /// Points of the cubic Bézier `p[0]..p[3]`, excluding `p[0]`.
    #[must_use]
    pub fn bezier_points(&self, p: [[f32; 3]; 4]) -> Vec<[f32; 3]> {
        self.bezier_span(p).map(|(_, point)| point).collect()
    }

    /// Points of the quadratic `p0, c, p2`, excluding `p0`.
    #[must_use]
    pub fn quadratic_points(&self, p0: [f32; 3], c: [f32; 3], p2: [f32; 3]) -> Vec<[f32; 3]> {
        self.bezier_points(promote_quadratic(p0, c, p2))
    }

    /// Points of the Catmull-Rom span `p[1]..p[2]`, excluding `p[1]`.
    #[must_use]
    pub fn curve_points(&self, p: [[f32; 3]; 4]) -> Vec<[f32; 3]> {
        self.curve_span(p).map(|(_, point)| point).collect()
    }

    fn bezier_span(&self, p: [[f32; 3]; 4]) -> ForwardDifferences {
        ForwardDifferences::new(&BEZIER_BASIS, p, p[3], self.bezier_detail)
    }

    fn curve_span(&self, p: [[f32; 3]; 4]) -> ForwardDifferences {
        ForwardDifferences::new(&self.curve_basis, p, p[2], self.curve_detail)
    }

    /// Rewrite `raw` into `out` with only [`VertexCode::Plain`] and
    /// [`VertexCode::Break`] codes left.
    ///
    /// Flattened points interpolate every non-position attribute linearly
    /// between the start and end vertex of their span. A break recorded
    /// before a curve transfers to the first point the curve emits.
    pub fn flatten(&self, raw: &RawGeometry, registry: &AttribRegistry, out: &mut RawGeometry) {
        out.clear();
        let mut cursor = 0;
        let mut pending_break = false;
        let mut spline: Vec<usize> = Vec::new();
        for &code in raw.codes() {
            if cursor + code.vertex_count() > raw.len() {
                log::warn!("curve code {code:?} at vertex {cursor} is missing its trailing vertices");
                break;
            }
            if code != VertexCode::CurveControl {
                spline.clear();
            }
            match code {
                VertexCode::Break => pending_break = true,
                VertexCode::Plain => {
                    emit(out, &raw.snapshot(cursor, registry), registry, &mut pending_break);
                }
                VertexCode::BezierControl | VertexCode::QuadraticControl => {
                    let anchor_index = cursor + code.vertex_count() - 1;
                    let start = if out.is_empty() {
                        let first = raw.snapshot(cursor, registry);
                        emit(out, &first, registry, &mut pending_break);
                        first
                    } else {
                        out.snapshot(out.len() - 1, registry)
                    };
                    let anchor = raw.snapshot(anchor_index, registry);
                    let p0 = start.attrs.position;
                    let controls = if code == VertexCode::BezierControl {
                        [p0, raw.position(cursor), raw.position(cursor + 1), anchor.attrs.position]
                    } else {
                        promote_quadratic(p0, raw.position(cursor), anchor.attrs.position)
                    };
                    for (t, position) in self.bezier_span(controls) {
                        let v = start.lerp(&anchor, t, position, registry);
                        emit(out, &v, registry, &mut pending_break);
                    }
                }
                VertexCode::CurveControl => {
                    spline.push(cursor);
                    if spline.len() >= 4 {
                        let run = &spline[spline.len() - 4..];
                        let from = raw.snapshot(run[1], registry);
                        let to = raw.snapshot(run[2], registry);
                        if spline.len() == 4 {
                            emit(out, &from, registry, &mut pending_break);
                        }
                        let controls = [0, 1, 2, 3].map(|k| raw.position(run[k]));
                        for (t, position) in self.curve_span(controls) {
                            let v = from.lerp(&to, t, position, registry);
                            emit(out, &v, registry, &mut pending_break);
                        }
                    }
                }
            }
            cursor += code.vertex_count();
        }
    }
}

fn emit(out: &mut RawGeometry, v: &RawVertex, registry: &AttribRegistry, pending_break: &mut bool) {
    if std::mem::take(pending_break) {
        out.add_code(VertexCode::Break);
    }
    out.add_code(VertexCode::Plain);
    out.push_snapshot(v, registry);
}

/// Lift a quadratic's control point by the 2/3 rule.
fn promote_quadratic(p0: [f32; 3], c: [f32; 3], p2: [f32; 3]) -> [[f32; 3]; 4] {
    let lift = |from: [f32; 3]| std::array::from_fn(|k| from[k] + (c[k] - from[k]) * 2.0 / 3.0);
    [p0, lift(p0), lift(p2), p2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VertexAttrs;

    const CONTROLS: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [0.0, 100.0, 0.0],
        [100.0, 100.0, 0.0],
        [100.0, 0.0, 0.0],
    ];

    fn bezier_at(p: [[f32; 3]; 4], t: f32) -> [f32; 3] {
        let u = 1.0 - t;
        let w = [u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t];
        std::array::from_fn(|k| (0..4).map(|j| w[j] * p[j][k]).sum())
    }

    fn distance_to_segment(p: [f32; 3], a: [f32; 3], b: [f32; 3]) -> f32 {
        let ab: [f32; 3] = std::array::from_fn(|k| b[k] - a[k]);
        let ap: [f32; 3] = std::array::from_fn(|k| p[k] - a[k]);
        let len2: f32 = ab.iter().map(|x| x * x).sum();
        let t = if len2 > 0.0 {
            (ab.iter().zip(&ap).map(|(x, y)| x * y).sum::<f32>() / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (0..3)
            .map(|k| (ap[k] - ab[k] * t).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    #[expect(clippy::cast_precision_loss)]
    fn max_deviation(detail: usize) -> f32 {
        let flattener = CurveFlattener::new(&TessConfig::default().with_bezier_detail(detail));
        let mut polyline = vec![CONTROLS[0]];
        polyline.extend(flattener.bezier_points(CONTROLS));
        (0..=1000)
            .map(|i| {
                let p = bezier_at(CONTROLS, i as f32 / 1000.0);
                polyline
                    .windows(2)
                    .map(|s| distance_to_segment(p, s[0], s[1]))
                    .fold(f32::INFINITY, f32::min)
            })
            .fold(0.0, f32::max)
    }

    #[test]
    fn detail_one_is_the_chord() {
        let flattener = CurveFlattener::new(&TessConfig::default().with_bezier_detail(1));
        assert_eq!(flattener.bezier_points(CONTROLS), vec![CONTROLS[3]]);
    }

    #[test]
    fn flattening_converges_with_detail() {
        let deviations: Vec<f32> = [1, 2, 4, 8, 16, 32].map(max_deviation).to_vec();
        for pair in deviations.windows(2) {
            assert!(pair[1] < pair[0], "{deviations:?}");
        }
        assert!(deviations[5] < 0.1);
    }

    #[test]
    #[expect(clippy::cast_precision_loss)]
    fn forward_differences_match_direct_evaluation() {
        let points: Vec<_> = ForwardDifferences::new(&BEZIER_BASIS, CONTROLS, CONTROLS[3], 10).collect();
        assert_eq!(points.len(), 10);
        for (i, (t, p)) in points.iter().enumerate() {
            assert!((t - (i + 1) as f32 / 10.0).abs() < 1e-6);
            let expected = bezier_at(CONTROLS, *t);
            for k in 0..3 {
                assert!((p[k] - expected[k]).abs() < 1e-3, "{p:?} vs {expected:?}");
            }
        }
    }

    #[test]
    fn quadratic_midpoint_matches_analytic() {
        let flattener = CurveFlattener::new(&TessConfig::default().with_bezier_detail(2));
        let points = flattener.quadratic_points([0.0; 3], [50.0, 100.0, 0.0], [100.0, 0.0, 0.0]);
        // Q(0.5) = p0/4 + c/2 + p2/4
        assert!((points[0][0] - 50.0).abs() < 1e-4);
        assert!((points[0][1] - 50.0).abs() < 1e-4);
        assert_eq!(points[1], [100.0, 0.0, 0.0]);
    }

    #[test]
    fn catmull_rom_span_runs_between_inner_points() {
        let flattener = CurveFlattener::new(&TessConfig::default().with_curve_detail(8));
        let p = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [20.0, 10.0, 0.0], [30.0, 10.0, 0.0]];
        let points = flattener.curve_points(p);
        assert_eq!(points.len(), 8);
        assert_eq!(points[7], p[2]);
    }

    #[test]
    fn flatten_interpolates_attributes_and_keeps_breaks() {
        let registry = AttribRegistry::new();
        let flattener = CurveFlattener::new(&TessConfig::default().with_bezier_detail(4));
        let mut raw = RawGeometry::new();
        let mut start = VertexAttrs::default().at([0.0, 0.0, 0.0]);
        start.fill = [0, 0, 0, 255];
        raw.add_vertex(&start, &[], &registry, VertexCode::Plain);
        raw.add_code(VertexCode::Break);
        raw.add_code(VertexCode::BezierControl);
        let mut anchor = VertexAttrs::default().at([100.0, 0.0, 0.0]);
        anchor.fill = [200, 0, 0, 255];
        raw.push_vertex(&VertexAttrs::default().at([0.0, 100.0, 0.0]), &[], &registry);
        raw.push_vertex(&VertexAttrs::default().at([100.0, 100.0, 0.0]), &[], &registry);
        raw.push_vertex(&anchor, &[], &registry);

        let mut out = RawGeometry::new();
        flattener.flatten(&raw, &registry, &mut out);
        assert_eq!(out.len(), 5);
        assert_eq!(out.codes()[1], VertexCode::Break);
        assert_eq!(out.contours(), vec![0..1, 1..5]);
        assert_eq!(out.position(4), [100.0, 0.0, 0.0]);
        assert_eq!(out.vertex(2).fill, [100, 0, 0, 255]);
        assert_eq!(out.vertex(4).fill, [200, 0, 0, 255]);
    }

    #[test]
    fn short_spline_runs_emit_nothing() {
        let registry = AttribRegistry::new();
        let flattener = CurveFlattener::new(&TessConfig::default());
        let mut raw = RawGeometry::new();
        for x in [0.0, 1.0, 2.0] {
            raw.add_vertex(&VertexAttrs::default().at([x, 0.0, 0.0]), &[], &registry, VertexCode::CurveControl);
        }
        let mut out = RawGeometry::new();
        flattener.flatten(&raw, &registry, &mut out);
        assert!(out.is_empty());
    }
}
