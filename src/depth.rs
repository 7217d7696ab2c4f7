//! Approximate back-to-front triangle ordering for transparency.
//!
//! Triangles are sorted by the nearest-to-back corner of their projected
//! bounding box, then a forward sweep resolves overlapping pairs with plane
//! tests. Coordinates are camera space: z decreases away from the viewer,
//! so drawing in ascending z paints back to front.

use glam::{Mat4, Vec3};

/// Maps a model-space position to camera space for depth sorting.
pub trait Projection {
    /// Project `p`.
    fn project(&self, p: [f32; 3]) -> [f32; 3];
}

impl Projection for Mat4 {
    fn project(&self, p: [f32; 3]) -> [f32; 3] {
        self.project_point3(Vec3::from(p)).to_array()
    }
}

impl<F: Fn([f32; 3]) -> [f32; 3]> Projection for F {
    fn project(&self, p: [f32; 3]) -> [f32; 3] {
        self(p)
    }
}

/// Leaves positions untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityProjection;

impl Projection for IdentityProjection {
    fn project(&self, p: [f32; 3]) -> [f32; 3] {
        p
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    fn of(tri: &[Vec3; 3]) -> Self {
        Self {
            min: tri[0].min(tri[1]).min(tri[2]),
            max: tri[0].max(tri[1]).max(tri[2]),
        }
    }

    fn overlaps_z(&self, other: &Self) -> bool {
        self.min.z < other.max.z && other.min.z < self.max.z
    }

    fn overlaps_xy(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

/// Where a set of points lies relative to a triangle's plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// Toward the viewer.
    Front,
    Behind,
    /// On the plane, or the plane is edge-on and says nothing.
    Coplanar,
    Straddle,
}

fn side(plane: &[Vec3; 3], points: &[Vec3; 3], epsilon: f32) -> Side {
    let mut normal = (plane[1] - plane[0]).cross(plane[2] - plane[0]);
    if normal.z == 0.0 || !normal.is_finite() {
        return Side::Coplanar;
    }
    if normal.z < 0.0 {
        normal = -normal;
    }
    let d = points.map(|p| normal.dot(p - plane[0]));
    let eps = d.iter().fold(0.0f32, |m, v| m.max(v.abs())) * epsilon;
    let front = d.iter().any(|&v| v > eps);
    let behind = d.iter().any(|&v| v < -eps);
    match (front, behind) {
        (true, true) => Side::Straddle,
        (true, false) => Side::Front,
        (false, true) => Side::Behind,
        (false, false) => Side::Coplanar,
    }
}

/// Reusable scratch for [`sort`](DepthSorter::sort).
#[derive(Debug, Clone, Default)]
pub struct DepthSorter {
    epsilon: f32,
    boxes: Vec<Aabb>,
    swapped: Vec<bool>,
    order: Vec<usize>,
}

impl DepthSorter {
    /// A sorter whose plane tests ignore displacements below `epsilon`
    /// times the largest displacement of the tested points.
    #[must_use]
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    /// Whether `a` may safely be drawn before `c`.
    fn behind(&self, a: &[Vec3; 3], c: &[Vec3; 3]) -> bool {
        matches!(side(c, a, self.epsilon), Side::Behind | Side::Coplanar)
            || matches!(side(a, c, self.epsilon), Side::Front | Side::Coplanar)
    }

    /// Back-to-front draw order for `triangles` (camera-space corners).
    ///
    /// Returns a permutation of `0..triangles.len()`. A pair is swapped only
    /// when the later one is behind the earlier one and not the other way
    /// around; pairs that test behind each other keep their input order.
    /// Each triangle moves forward at most once per sort, which bounds the
    /// work on cyclic overlaps.
    pub fn sort(&mut self, triangles: &[[Vec3; 3]]) -> &[usize] {
        let n = triangles.len();
        self.boxes.clear();
        self.boxes.extend(triangles.iter().map(Aabb::of));
        self.order.clear();
        self.order.extend(0..n);
        let boxes = &self.boxes;
        self.order
            .sort_by(|&a, &b| boxes[a].min.z.total_cmp(&boxes[b].min.z));
        self.swapped.clear();
        self.swapped.resize(n, false);

        let mut swaps = 0usize;
        let mut active = 0;
        while active < n {
            // Up to here the tail is not sorted relative to the active box.
            let mut disorder_end = active;
            let mut test = active + 1;
            while test < n {
                let (a, c) = (self.order[active], self.order[test]);
                let (box_a, box_c) = (self.boxes[a], self.boxes[c]);
                if !box_a.overlaps_z(&box_c) {
                    if test > disorder_end && box_c.min.z >= box_a.max.z {
                        break;
                    }
                    test += 1;
                    continue;
                }
                if !box_a.overlaps_xy(&box_c)
                    || self.behind(&triangles[a], &triangles[c])
                    || !self.behind(&triangles[c], &triangles[a])
                {
                    test += 1;
                    continue;
                }
                if self.swapped[c] {
                    break;
                }
                self.swapped[c] = true;
                self.order[active..=test].rotate_right(1);
                disorder_end = disorder_end.max(test);
                swaps += 1;
                test = active + 1;
            }
            active += 1;
        }
        log::trace!("depth sorted {n} triangles with {swaps} swaps");
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(points: [[f32; 3]; 3]) -> [Vec3; 3] {
        points.map(Vec3::from)
    }

    #[test]
    fn separated_triangles_keep_their_order() {
        let tris = [-30.0, -20.0, -10.0].map(|z| {
            tri([[0.0, 0.0, z], [10.0, 0.0, z], [0.0, 10.0, z]])
        });
        let mut sorter = DepthSorter::new(1e-4);
        assert_eq!(sorter.sort(&tris), &[0, 1, 2]);
    }

    #[test]
    fn min_z_order_is_applied_first() {
        let tris = [-10.0, -30.0, -20.0].map(|z| {
            tri([[0.0, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z]])
        });
        let mut sorter = DepthSorter::new(1e-4);
        assert_eq!(sorter.sort(&tris), &[1, 2, 0]);
    }

    #[test]
    fn triangle_behind_a_slanted_one_moves_first() {
        let a = tri([[0.0, 0.0, -10.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        let b = tri([[3.0, 3.0, -6.0], [5.0, 3.0, -6.0], [4.0, 5.0, -6.0]]);
        let mut sorter = DepthSorter::new(1e-4);
        assert_eq!(sorter.sort(&[a, b]), &[1, 0]);
    }

    #[test]
    fn coplanar_pair_keeps_input_order() {
        let a = tri([[0.0, 0.0, -5.0], [10.0, 0.0, -5.0], [0.0, 10.0, -5.0]]);
        let b = tri([[1.0, 1.0, -5.0], [6.0, 1.0, -5.0], [1.0, 6.0, -5.0]]);
        let mut sorter = DepthSorter::new(1e-4);
        assert_eq!(sorter.sort(&[a, b]), &[0, 1]);
    }

    #[test]
    fn edge_on_planes_are_inconclusive() {
        let plane = tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let points = tri([[0.0, 1.0, 0.0], [0.0, 2.0, 0.0], [0.0, 3.0, 0.0]]);
        assert_eq!(side(&plane, &points, 1e-4), Side::Coplanar);
    }

    #[test]
    fn projection_closure_and_matrix() {
        let flip = |p: [f32; 3]| [p[0], p[1], -p[2]];
        assert_eq!(flip.project([1.0, 2.0, 3.0]), [1.0, 2.0, -3.0]);
        let m = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(m.project([0.0, 0.0, 0.0]), [0.0, 0.0, -5.0]);
        assert_eq!(IdentityProjection.project([4.0, 5.0, 6.0]), [4.0, 5.0, 6.0]);
    }
}
