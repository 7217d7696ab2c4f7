#![allow(clippy::unwrap_used)]

use glam::Vec3;
use polybatch::curve::CurveFlattener;
use polybatch::{
    EndShape, FillGeometry, IndexCache, Rgba, ShapeKind, TessConfig, Tessellator, TextureId,
    MAX_INDEX_WIDTH,
};
use rstest::rstest;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fill_only() -> EndShape {
    EndShape::closed().with_stroke(false)
}

fn assert_blocks_in_range(cache: &IndexCache, indices: &[u16], max: usize) {
    for block in cache.blocks() {
        assert!(block.vertex_count <= max, "{block:?} exceeds {max}");
        for &i in &indices[block.index_range()] {
            assert!(usize::from(i) < block.vertex_count, "{i} escapes {block:?}");
        }
    }
}

fn strip_position(i: usize) -> [f32; 3] {
    #[expect(clippy::cast_precision_loss)]
    [(i % 1000) as f32, (i / 1000) as f32, 0.0]
}

#[expect(clippy::cast_possible_truncation)]
fn strip_color(i: usize) -> Rgba {
    [(i % 256) as u8, (i / 256 % 256) as u8, (i / 65536 % 256) as u8, 255]
}

fn strip(tess: &mut Tessellator, n: usize) {
    tess.begin_shape(ShapeKind::TriangleStrip).unwrap();
    for i in 0..n {
        tess.set_fill(strip_color(i));
        tess.vertex(strip_position(i)).unwrap();
    }
    tess.end_shape(EndShape::open().with_stroke(false)).unwrap();
}

/// Every resolved triangle matches the raw strip, duplicates included.
fn assert_resolves_to_strip(fill: &FillGeometry, n: usize) {
    assert_eq!(fill.triangle_count(), n - 2);
    for (k, tri) in fill.triangles().enumerate() {
        let expected = if k % 2 == 0 { [k, k + 1, k + 2] } else { [k + 1, k, k + 2] };
        for (v, src) in tri.into_iter().zip(expected) {
            assert_eq!(fill.positions()[v], strip_position(src), "triangle {k}");
            assert_eq!(fill.colors()[v], strip_color(src), "triangle {k}");
        }
    }
}

#[test]
fn strip_of_three_index_widths_stays_in_range() {
    init();
    let n = 3 * MAX_INDEX_WIDTH;
    let mut tess = Tessellator::default();
    strip(&mut tess, n);
    let frame = tess.flush();
    assert!(frame.fill.cache().len() >= 3);
    assert_blocks_in_range(frame.fill.cache(), frame.fill.indices(), MAX_INDEX_WIDTH);
    assert_resolves_to_strip(frame.fill, n);
}

#[rstest]
#[case(5)]
#[case(16)]
#[case(1000)]
fn small_index_widths_duplicate_bit_identical_vertices(#[case] max: usize) {
    init();
    let n = 2500;
    let mut tess = Tessellator::new(TessConfig::default().with_max_vertex_index(max));
    strip(&mut tess, n);
    let frame = tess.flush();
    assert_blocks_in_range(frame.fill.cache(), frame.fill.indices(), max);
    assert!(frame.fill.vertex_count() > n, "a split must duplicate vertices");
    assert_resolves_to_strip(frame.fill, n);
    let drawn: usize = frame.fill_draws.iter().map(|d| d.index_count).sum();
    assert_eq!(drawn, frame.fill.indices().len());
}

#[test]
fn polygon_of_three_index_widths_stays_in_range() {
    init();
    let n = 3 * MAX_INDEX_WIDTH;
    let mut tess = Tessellator::default();
    tess.begin_shape(ShapeKind::Polygon).unwrap();
    for i in 0..n {
        #[expect(clippy::cast_precision_loss)]
        let angle = std::f32::consts::TAU * i as f32 / n as f32;
        tess.vertex([1e4 * angle.cos(), 1e4 * angle.sin(), 0.0]).unwrap();
    }
    let report = tess.end_shape(fill_only()).unwrap();
    assert!(!report.dropped_fill);
    assert!(report.triangles > 0);
    let frame = tess.flush();
    assert_blocks_in_range(frame.fill.cache(), frame.fill.indices(), MAX_INDEX_WIDTH);
}

#[rstest]
#[case(8)]
#[case(64)]
fn stroke_quads_stay_in_range(#[case] max: usize) {
    init();
    let mut tess = Tessellator::new(TessConfig::default().with_max_vertex_index(max));
    tess.begin_shape(ShapeKind::Polygon).unwrap();
    for i in 0..200 {
        tess.vertex(strip_position(i * 7)).unwrap();
    }
    let report = tess.end_shape(EndShape::open().with_fill(false)).unwrap();
    assert_eq!(report.line_segments, 199);
    let frame = tess.flush();
    assert_blocks_in_range(frame.line.cache(), frame.line.indices(), max);
    assert!(frame.line_draws.len() > 1);
}

fn segment_distance(p: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let t = ((p - a).dot(ab) / ab.length_squared()).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

fn bezier(p: [Vec3; 4], t: f32) -> Vec3 {
    let u = 1.0 - t;
    p[0] * u * u * u + p[1] * 3.0 * u * u * t + p[2] * 3.0 * u * t * t + p[3] * t * t * t
}

#[test]
fn bezier_flattening_converges_from_the_chord() {
    let controls = [[0.0, 0.0, 0.0], [30.0, 100.0, 0.0], [70.0, -60.0, 0.0], [100.0, 0.0, 0.0]];
    let p = controls.map(Vec3::from);
    let chord = CurveFlattener::new(&TessConfig::default().with_bezier_detail(1)).bezier_points(controls);
    assert_eq!(chord, vec![controls[3]]);

    let mut previous = f32::INFINITY;
    for detail in [1, 2, 4, 8, 16, 32, 64] {
        let flattener = CurveFlattener::new(&TessConfig::default().with_bezier_detail(detail));
        let mut polyline = vec![p[0]];
        polyline.extend(flattener.bezier_points(controls).into_iter().map(Vec3::from));
        let deviation = (0..=500)
            .map(|s| {
                #[expect(clippy::cast_precision_loss)]
                let q = bezier(p, s as f32 / 500.0);
                polyline
                    .windows(2)
                    .map(|w| segment_distance(q, w[0], w[1]))
                    .fold(f32::INFINITY, f32::min)
            })
            .fold(0.0, f32::max);
        assert!(deviation < previous, "detail {detail}: {deviation} >= {previous}");
        previous = deviation;
    }
    assert!(previous < 0.1);
}

fn area(fill: &FillGeometry) -> f32 {
    fill.triangles()
        .map(|t| {
            let [a, b, c] = t.map(|v| Vec3::from(fill.positions()[v]));
            (b - a).cross(c - a).length() / 2.0
        })
        .sum()
}

fn square(tess: &mut Tessellator, min: f32, max: f32, ccw: bool) {
    let mut corners = vec![[min, min], [max, min], [max, max], [min, max]];
    if !ccw {
        corners.reverse();
    }
    for [x, y] in corners {
        tess.vertex([x, y, 0.0]).unwrap();
    }
}

#[test]
fn square_fills_with_two_triangles() {
    init();
    let mut tess = Tessellator::default();
    tess.begin_shape(ShapeKind::Polygon).unwrap();
    square(&mut tess, 0.0, 10.0, true);
    tess.end_shape(fill_only()).unwrap();
    let frame = tess.flush();
    assert_eq!(frame.fill.triangle_count(), 2);
    assert!((area(frame.fill) - 100.0).abs() < 1e-3);
}

#[test]
fn hole_is_left_out_of_the_fill() {
    init();
    let mut tess = Tessellator::default();
    tess.begin_shape(ShapeKind::Polygon).unwrap();
    square(&mut tess, 0.0, 10.0, true);
    tess.begin_contour().unwrap();
    square(&mut tess, 3.0, 7.0, false);
    tess.end_contour().unwrap();
    let report = tess.end_shape(fill_only()).unwrap();
    assert!(!report.dropped_fill);
    let frame = tess.flush();
    assert!(frame.fill.triangle_count() >= 8);
    assert!((area(frame.fill) - 84.0).abs() < 1e-3);
}

#[test]
fn alternating_textures_partition_into_four_batches() {
    init();
    let (t1, t2) = (Some(TextureId(1)), Some(TextureId(2)));
    let mut tess = Tessellator::default();
    for (k, texture) in [t1, t1, t2, t2, None, t1].into_iter().enumerate() {
        tess.set_texture(texture);
        tess.begin_shape(ShapeKind::Triangles).unwrap();
        #[expect(clippy::cast_precision_loss)]
        let x = k as f32 * 10.0;
        for p in [[x, 0.0, 0.0], [x + 5.0, 0.0, 0.0], [x, 5.0, 0.0]] {
            tess.vertex(p).unwrap();
        }
        tess.end_shape(EndShape::open().with_stroke(false)).unwrap();
    }
    let frame = tess.flush();
    let textures: Vec<_> = frame.texture_batches.iter().map(|b| b.texture).collect();
    assert_eq!(textures, [t1, t2, None, t1]);
    let spans: Vec<_> = frame
        .fill_draws
        .iter()
        .map(|d| (d.texture, d.index_offset, d.index_count))
        .collect();
    assert_eq!(spans, [(t1, 0, 6), (t2, 6, 6), (None, 12, 3), (t1, 15, 3)]);
}

fn triangle(tess: &mut Tessellator, corners: [[f32; 3]; 3]) {
    tess.begin_shape(ShapeKind::Triangles).unwrap();
    for p in corners {
        tess.vertex(p).unwrap();
    }
    tess.end_shape(EndShape::open().with_stroke(false)).unwrap();
}

fn first_corners(fill: &FillGeometry) -> Vec<[f32; 3]> {
    fill.triangles().map(|t| fill.positions()[t[0]]).collect()
}

#[test]
fn depth_sort_keeps_back_to_front_input() {
    init();
    let mut tess = Tessellator::default();
    tess.enable_depth_sort(true);
    for z in [-30.0, -20.0, -10.0] {
        triangle(&mut tess, [[0.0, 0.0, z], [10.0, 0.0, z], [0.0, 10.0, z]]);
    }
    let frame = tess.flush();
    assert_eq!(
        first_corners(frame.fill),
        [[0.0, 0.0, -30.0], [0.0, 0.0, -20.0], [0.0, 0.0, -10.0]]
    );
}

#[test]
fn depth_sort_swaps_a_nearer_triangle_drawn_first() {
    init();
    let mut tess = Tessellator::default();
    tess.enable_depth_sort(true);
    tess.set_texture(Some(TextureId(4)));
    triangle(&mut tess, [[0.0, 0.0, -10.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
    tess.set_texture(None);
    triangle(&mut tess, [[3.0, 3.0, -6.0], [5.0, 3.0, -6.0], [4.0, 5.0, -6.0]]);
    let frame = tess.flush();
    assert_eq!(first_corners(frame.fill), [[3.0, 3.0, -6.0], [0.0, 0.0, -10.0]]);
    let textures: Vec<_> = frame.fill_draws.iter().map(|d| d.texture).collect();
    assert_eq!(textures, [None, Some(TextureId(4))]);
}

#[test]
fn flush_is_idempotent_and_the_next_shape_starts_a_frame() {
    init();
    let mut tess = Tessellator::default();
    tess.enable_depth_sort(true);
    tess.set_texture(Some(TextureId(1)));
    tess.begin_shape(ShapeKind::Polygon).unwrap();
    square(&mut tess, 0.0, 10.0, true);
    tess.end_shape(EndShape::closed()).unwrap();
    triangle(&mut tess, [[0.0, 0.0, -1.0], [4.0, 0.0, -1.0], [0.0, 4.0, -1.0]]);

    let first = tess.flush();
    let (fill, line, draws) = (first.fill.clone(), first.line.clone(), first.fill_draws.clone());
    let second = tess.flush();
    assert_eq!(second.fill, &fill);
    assert_eq!(second.line, &line);
    assert_eq!(second.fill_draws, draws);

    triangle(&mut tess, [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    assert_eq!(tess.flush().fill.triangle_count(), 1);
}
