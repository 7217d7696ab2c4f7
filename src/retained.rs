//! Shapes that keep their recorded vertices and re-tessellate on demand.

use crate::batch::TessGeometry;
use crate::error::TessError;
use crate::raw::RawGeometry;
use crate::tessellator::{Frame, ShapeReport, ShapeSpec, Tessellator};
use crate::types::{EndShape, Rgba, ShapeKind, TextureId, VertexAttrs};

/// A recorded shape that owns its geometry.
///
/// Editing a vertex marks the shape dirty; the next
/// [`tessellate`](Self::tessellate) rebuilds its geometry with the
/// tessellator's current settings. Vertex indices count every recorded
/// vertex, curve controls included.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedShape {
    raw: RawGeometry,
    spec: ShapeSpec,
    geometry: TessGeometry,
    report: Option<ShapeReport>,
    dirty: bool,
}

impl RetainedShape {
    pub(crate) fn new(raw: RawGeometry, spec: ShapeSpec) -> Self {
        Self {
            raw,
            spec,
            geometry: TessGeometry::default(),
            report: None,
            dirty: true,
        }
    }

    /// The shape's primitive kind.
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        self.spec.kind
    }

    /// Number of recorded vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether no vertices were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether the geometry is out of date.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Attributes of vertex `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    #[must_use]
    pub fn vertex(&self, i: usize) -> VertexAttrs {
        self.raw.vertex(i)
    }

    /// Replace the attributes of vertex `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn set_vertex(&mut self, i: usize, v: &VertexAttrs) {
        self.raw.set_vertex(i, v);
        self.dirty = true;
    }

    /// Move vertex `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn set_position(&mut self, i: usize, position: [f32; 3]) {
        let v = self.raw.vertex(i).at(position);
        self.set_vertex(i, &v);
    }

    /// Recolor the fill of vertex `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn set_fill(&mut self, i: usize, color: Rgba) {
        let mut v = self.raw.vertex(i);
        v.fill = color;
        self.set_vertex(i, &v);
    }

    /// Recolor the stroke of vertex `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn set_stroke(&mut self, i: usize, color: Rgba) {
        let mut v = self.raw.vertex(i);
        v.stroke = color;
        self.set_vertex(i, &v);
    }

    /// Bind a texture to the fill.
    pub fn set_texture(&mut self, texture: Option<TextureId>) {
        self.spec.texture = texture;
        self.dirty = true;
    }

    /// Change whether the shape is closed, filled or stroked.
    pub fn set_end(&mut self, end: EndShape) {
        self.spec.end = end;
        self.dirty = true;
    }

    /// The geometry, if it is up to date.
    #[must_use]
    pub fn geometry(&self) -> Option<&TessGeometry> {
        (!self.dirty).then_some(&self.geometry)
    }

    /// Report of the last tessellation.
    #[must_use]
    pub fn report(&self) -> Option<&ShapeReport> {
        self.report.as_ref()
    }

    /// Rebuild the geometry if it is dirty.
    ///
    /// The model matrix is never applied: retained geometry stays in model
    /// space.
    ///
    /// # Errors
    ///
    /// [`TessError::CapacityExceeded`] as for
    /// [`Tessellator::end_shape`]; the shape stays dirty.
    pub fn tessellate(&mut self, tess: &mut Tessellator) -> Result<&TessGeometry, TessError> {
        if self.dirty {
            let mut geometry = TessGeometry::default();
            let report = tess.context(None).run(&self.raw, &self.spec, &mut geometry)?;
            log::debug!("re-tessellated retained {:?} shape", self.spec.kind);
            self.geometry = geometry;
            self.report = Some(report);
            self.dirty = false;
        }
        Ok(&self.geometry)
    }

    /// The geometry with its draw ranges, if it is up to date.
    #[must_use]
    pub fn frame(&self) -> Option<Frame<'_>> {
        (!self.dirty).then(|| Frame::new(&self.geometry))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn triangle(tess: &mut Tessellator) -> RetainedShape {
        tess.begin_shape(ShapeKind::Polygon).unwrap();
        for p in [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]] {
            tess.vertex(p).unwrap();
        }
        tess.end_retained(EndShape::closed().with_stroke(false)).unwrap()
    }

    #[test]
    fn retained_shape_starts_dirty_and_leaves_the_frame_alone() {
        let mut tess = Tessellator::default();
        let mut shape = triangle(&mut tess);
        assert!(shape.is_dirty());
        assert!(shape.geometry().is_none());
        assert_eq!(shape.len(), 3);
        let geometry = shape.tessellate(&mut tess).unwrap();
        assert_eq!(geometry.fill.triangle_count(), 1);
        assert!(tess.geometry().is_empty());
        assert!(!shape.is_dirty());
    }

    #[test]
    fn edits_take_effect_on_the_next_tessellation() {
        let mut tess = Tessellator::default();
        let mut shape = triangle(&mut tess);
        shape.tessellate(&mut tess).unwrap();
        shape.set_position(1, [20.0, 0.0, 0.0]);
        shape.set_fill(2, [255, 0, 0, 255]);
        assert!(shape.is_dirty());
        assert!(shape.frame().is_none());
        let geometry = shape.tessellate(&mut tess).unwrap();
        assert!(geometry.fill.positions().contains(&[20.0, 0.0, 0.0]));
        assert!(geometry.fill.colors().contains(&[255, 0, 0, 255]));
        assert_eq!(shape.frame().unwrap().fill_draws.len(), 1);
    }

    #[test]
    fn texture_changes_retag_the_fill() {
        let mut tess = Tessellator::default();
        let mut shape = triangle(&mut tess);
        shape.set_texture(Some(TextureId(9)));
        shape.tessellate(&mut tess).unwrap();
        assert_eq!(shape.frame().unwrap().fill_draws[0].texture, Some(TextureId(9)));
    }
}
