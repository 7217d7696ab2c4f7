//! Tessellation settings.

/// Largest index width representable by `u16` element indices.
pub const MAX_INDEX_WIDTH: usize = 1 << 16;

/// Tunables shared by every stage of the pipeline.
///
/// All fields have device-independent defaults; use the `with_*` methods to
/// override individual values:
///
/// ```
/// let config = polybatch::TessConfig::default()
///     .with_bezier_detail(32)
///     .with_max_vertex_index(4096);
/// assert_eq!(config.bezier_detail, 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessConfig {
    /// Maximum number of vertices a single index block may reference.
    /// Clamped to [`MAX_INDEX_WIDTH`].
    pub max_vertex_index: usize,
    /// Segments generated per cubic or quadratic Bézier span.
    pub bezier_detail: usize,
    /// Segments generated per Catmull-Rom span.
    pub curve_detail: usize,
    /// Catmull-Rom tightness; `0.0` is the classic Catmull-Rom spline.
    pub curve_tightness: f32,
    /// Lower bound on perimeter segments of a round point.
    pub min_point_detail: usize,
    /// Upper bound on perimeter segments of a round point.
    pub max_point_detail: usize,
    /// Perimeter length (in pixels) covered by one round-point segment.
    pub point_detail_factor: f32,
    /// Strokes thinner than this always use quad expansion.
    pub outline_weight_threshold: f32,
    /// Allow quad expansion for miter/bevel joins with butt/square caps.
    pub approximate_joins: bool,
    /// Insert bevel triangles between consecutive stroke quads.
    pub bevel_joins: bool,
    /// Miter joins longer than `miter_limit * weight / 2` become bevels.
    pub miter_limit: f32,
    /// Minimum segment count for round joins and caps in outline strokes.
    pub round_join_detail: usize,
    /// Relative epsilon used by the depth sorter's plane tests.
    pub sort_epsilon: f32,
    /// Apply the model and normal matrices on the CPU while batching.
    pub transform_ahead: bool,
}

impl Default for TessConfig {
    fn default() -> Self {
        Self {
            max_vertex_index: MAX_INDEX_WIDTH,
            bezier_detail: 20,
            curve_detail: 20,
            curve_tightness: 0.0,
            min_point_detail: 20,
            max_point_detail: 200,
            point_detail_factor: 20.0,
            outline_weight_threshold: 1.5,
            approximate_joins: true,
            bevel_joins: true,
            miter_limit: 4.0,
            round_join_detail: 16,
            sort_epsilon: 1e-4,
            transform_ahead: false,
        }
    }
}

impl TessConfig {
    /// The effective per-block vertex limit.
    #[must_use]
    pub fn index_limit(&self) -> usize {
        self.max_vertex_index.min(MAX_INDEX_WIDTH)
    }

    /// Set the per-block vertex limit.
    #[must_use]
    pub fn with_max_vertex_index(mut self, max: usize) -> Self {
        self.max_vertex_index = max;
        self
    }

    /// Set the Bézier detail.
    #[must_use]
    pub fn with_bezier_detail(mut self, detail: usize) -> Self {
        self.bezier_detail = detail.max(1);
        self
    }

    /// Set the Catmull-Rom detail.
    #[must_use]
    pub fn with_curve_detail(mut self, detail: usize) -> Self {
        self.curve_detail = detail.max(1);
        self
    }

    /// Set the Catmull-Rom tightness.
    #[must_use]
    pub fn with_curve_tightness(mut self, tightness: f32) -> Self {
        self.curve_tightness = tightness;
        self
    }

    /// Set the round point detail bounds.
    #[must_use]
    pub fn with_point_detail(mut self, min: usize, max: usize) -> Self {
        self.min_point_detail = min.max(3);
        self.max_point_detail = max.max(self.min_point_detail);
        self
    }

    /// Set the minimum weight for which strokes may use the outline path.
    #[must_use]
    pub fn with_outline_weight_threshold(mut self, weight: f32) -> Self {
        self.outline_weight_threshold = weight;
        self
    }

    /// Toggle quad expansion for non-round strokes.
    #[must_use]
    pub fn with_approximate_joins(mut self, approximate: bool) -> Self {
        self.approximate_joins = approximate;
        self
    }

    /// Toggle bevel triangles between stroke quads.
    #[must_use]
    pub fn with_bevel_joins(mut self, bevel: bool) -> Self {
        self.bevel_joins = bevel;
        self
    }

    /// Set the depth sorter's relative plane epsilon.
    #[must_use]
    pub fn with_sort_epsilon(mut self, epsilon: f32) -> Self {
        self.sort_epsilon = epsilon;
        self
    }

    /// Toggle CPU-side model/normal transforms.
    #[must_use]
    pub fn with_transform_ahead(mut self, enabled: bool) -> Self {
        self.transform_ahead = enabled;
        self
    }

    /// Number of perimeter segments for a round point of the given weight.
    #[must_use]
    pub fn point_segments(&self, weight: f32) -> usize {
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let wanted = (std::f32::consts::TAU * weight.max(0.0) / self.point_detail_factor) as usize;
        wanted.clamp(self.min_point_detail, self.max_point_detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_limit_is_clamped_to_u16_range() {
        let config = TessConfig::default().with_max_vertex_index(1 << 20);
        assert_eq!(config.index_limit(), MAX_INDEX_WIDTH);
    }

    #[test]
    fn point_segments_respect_bounds() {
        let config = TessConfig::default();
        assert_eq!(config.point_segments(1.0), config.min_point_detail);
        assert_eq!(config.point_segments(1.0e6), config.max_point_detail);
        // 2π·100 / 20 ≈ 31.4
        assert_eq!(config.point_segments(100.0), 31);
    }
}
