//! The immediate-mode recording API.
//!
//! A [`Tessellator`] records one shape at a time between
//! [`begin_shape`](Tessellator::begin_shape) and
//! [`end_shape`](Tessellator::end_shape), tessellates it into the frame's
//! batched geometry, and hands the whole frame out from
//! [`flush`](Tessellator::flush). The first shape begun after a flush starts
//! a new frame.

use glam::{Mat4, Vec3};

use crate::attribs::{AttribFormat, AttribId, AttribRegistry};
use crate::batch::{FillGeometry, LineGeometry, PointGeometry, TessGeometry, VertexTransform};
use crate::config::TessConfig;
use crate::curve::CurveFlattener;
use crate::depth::{DepthSorter, IdentityProjection, Projection};
use crate::error::TessError;
use crate::fill::{shape_indices, tessellate_polygon};
use crate::raw::RawGeometry;
use crate::retained::RetainedShape;
use crate::stroke::{
    build_outline, max_weight, point_block_size, tessellate_points, tessellate_quads, StrokePath,
    StrokeStyle,
};
use crate::texture::{block_ranges, DrawRange, TextureBatch};
use crate::triangulator::{LyonTriangulator, PolygonTriangulator, WindingRule};
use crate::types::{
    EndShape, Material, Rgba, ShapeKind, StrokeCap, StrokeJoin, TextureId, VertexAttrs,
    VertexCode, BLACK, WHITE,
};

/// Drawing state applied to vertices as they are recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    /// Fill color of new vertices.
    pub fill: Rgba,
    /// Stroke color of new vertices.
    pub stroke: Rgba,
    /// Stroke weight of new vertices.
    pub stroke_weight: f32,
    /// Stroke cap of the shape.
    pub cap: StrokeCap,
    /// Stroke join of the shape.
    pub join: StrokeJoin,
    /// Normal of new vertices.
    pub normal: [f32; 3],
    /// Texture coordinate of new vertices.
    pub texcoord: [f32; 2],
    /// Material of new vertices.
    pub material: Material,
    /// Texture bound to the shape's fill.
    pub texture: Option<TextureId>,
    /// Model matrix, applied on the CPU when transform-ahead is enabled.
    pub model: Mat4,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: WHITE,
            stroke: BLACK,
            stroke_weight: 1.0,
            cap: StrokeCap::default(),
            join: StrokeJoin::default(),
            normal: [0.0, 0.0, 1.0],
            texcoord: [0.0, 0.0],
            material: Material::default(),
            texture: None,
            model: Mat4::IDENTITY,
        }
    }
}

/// What happened to one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeReport {
    /// Triangles added to the fill geometry (fill and outline stroke).
    pub triangles: usize,
    /// Quads added to the line geometry.
    pub line_segments: usize,
    /// Points added to the point geometry.
    pub points: usize,
    /// How the stroke was tessellated, if it was.
    pub stroke_path: Option<StrokePath>,
    /// The triangulator rejected the fill; it was left out.
    pub dropped_fill: bool,
    /// The triangulator rejected the stroke outline; it was left out.
    pub dropped_stroke: bool,
}

/// Per-shape settings fixed at the end of recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShapeSpec {
    pub kind: ShapeKind,
    pub end: EndShape,
    pub stroke: StrokeStyle,
    pub texture: Option<TextureId>,
    pub auto_normals: bool,
}

/// Borrowed pipeline state shared by immediate and retained shapes.
pub(crate) struct ShapeContext<'a> {
    pub config: &'a TessConfig,
    pub registry: &'a AttribRegistry,
    pub flattener: &'a CurveFlattener,
    pub triangulator: &'a mut dyn PolygonTriangulator,
    pub flat: &'a mut RawGeometry,
    pub transform: Option<VertexTransform>,
}

impl ShapeContext<'_> {
    /// Flatten, triangulate and stroke `raw` into `out`.
    ///
    /// Capacity is checked before anything is emitted, so a failing shape
    /// leaves `out` untouched.
    pub fn run(
        &mut self,
        raw: &RawGeometry,
        spec: &ShapeSpec,
        out: &mut TessGeometry,
    ) -> Result<ShapeReport, TessError> {
        let config = self.config;
        let registry = self.registry;
        let transform = self.transform.as_ref();
        let max = config.index_limit();
        self.flattener.flatten(raw, registry, self.flat);
        self.flat.build_edges(spec.kind, spec.end.close);
        let flat: &RawGeometry = self.flat;

        let fills = spec.end.fill && !matches!(spec.kind, ShapeKind::Points | ShapeKind::Lines);
        let points = spec.end.stroke && spec.kind == ShapeKind::Points;
        let stroke_path = (spec.end.stroke && !points && !flat.edges().is_empty())
            .then(|| spec.stroke.path(max_weight(flat), flat.is_flat(), config));

        let mut needed = 0;
        if fills || stroke_path == Some(StrokePath::Outline) {
            needed = 3;
        }
        if stroke_path == Some(StrokePath::Quads) {
            needed = needed.max(4);
        }
        if points {
            needed = needed.max(point_block_size(flat, spec.stroke.cap, config));
        }
        if needed > max {
            return Err(TessError::CapacityExceeded { needed, max });
        }

        let mut report = ShapeReport {
            stroke_path,
            ..ShapeReport::default()
        };
        if fills {
            let range = if spec.kind == ShapeKind::Polygon {
                let rule = if flat.contours().len() > 1 {
                    WindingRule::Odd
                } else {
                    WindingRule::NonZero
                };
                match tessellate_polygon(flat, rule, &mut *self.triangulator, registry) {
                    Ok(poly) => Some(out.fill.append_triangles(
                        &poly.vertices,
                        &poly.indices,
                        max,
                        registry,
                        transform,
                    )?),
                    Err(e) => {
                        log::warn!("dropping fill of {:?} shape: {e}", spec.kind);
                        report.dropped_fill = true;
                        None
                    }
                }
            } else {
                let indices = shape_indices(spec.kind, flat.len());
                Some(out.fill.append_triangles(flat, &indices, max, registry, transform)?)
            };
            if let Some(range) = range {
                if spec.auto_normals && !flat.is_flat() {
                    out.fill.calc_normals(range.clone());
                }
                report.triangles += range.len() / 3;
                out.textures.tag(spec.texture, &out.fill.cache, range);
            }
        }

        if points {
            report.points = tessellate_points(flat, spec.stroke.cap, &mut out.point, config, transform)?;
        }
        match stroke_path {
            Some(StrokePath::Quads) => {
                report.line_segments = tessellate_quads(flat, &mut out.line, config, transform)?;
            }
            Some(StrokePath::Outline) => {
                let outline = build_outline(flat, spec.stroke, config, registry);
                match tessellate_polygon(&outline, WindingRule::NonZero, &mut *self.triangulator, registry) {
                    Ok(poly) => {
                        let range = out.fill.append_triangles(
                            &poly.vertices,
                            &poly.indices,
                            max,
                            registry,
                            transform,
                        )?;
                        report.triangles += range.len() / 3;
                        out.textures.tag(None, &out.fill.cache, range);
                    }
                    Err(e) => {
                        log::warn!("dropping stroke outline of {:?} shape: {e}", spec.kind);
                        report.dropped_stroke = true;
                    }
                }
            }
            None => {}
        }
        log::debug!("{:?} shape of {} vertices: {report:?}", spec.kind, flat.len());
        Ok(report)
    }
}

/// One flushed frame, ready for upload and drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    /// Triangle geometry.
    pub fill: &'a FillGeometry,
    /// Stroke quads.
    pub line: &'a LineGeometry,
    /// Point sprites.
    pub point: &'a PointGeometry,
    /// Texture batches over `fill`.
    pub texture_batches: &'a [TextureBatch],
    /// One draw per texture batch and block of `fill`.
    pub fill_draws: Vec<DrawRange>,
    /// One draw per block of `line`.
    pub line_draws: Vec<DrawRange>,
    /// One draw per block of `point`.
    pub point_draws: Vec<DrawRange>,
}

impl<'a> Frame<'a> {
    /// Draw ranges over `geometry`.
    #[must_use]
    pub fn new(geometry: &'a TessGeometry) -> Self {
        Self {
            fill: &geometry.fill,
            line: &geometry.line,
            point: &geometry.point,
            texture_batches: geometry.textures.batches(),
            fill_draws: geometry.textures.draw_ranges(&geometry.fill.cache),
            line_draws: block_ranges(&geometry.line.cache),
            point_draws: block_ranges(&geometry.point.cache),
        }
    }
}

/// Records shapes and batches them for drawing.
pub struct Tessellator {
    config: TessConfig,
    registry: AttribRegistry,
    attrib_values: Vec<[f64; 4]>,
    style: Style,
    shape: Option<ShapeKind>,
    contour_open: bool,
    normal_set: bool,
    raw: RawGeometry,
    flat: RawGeometry,
    flattener: CurveFlattener,
    triangulator: Box<dyn PolygonTriangulator>,
    geometry: TessGeometry,
    depth_sort: bool,
    projection: Box<dyn Projection>,
    sorter: DepthSorter,
    flushed: bool,
    sorted: bool,
}

impl std::fmt::Debug for Tessellator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tessellator")
            .field("config", &self.config)
            .field("shape", &self.shape)
            .field("depth_sort", &self.depth_sort)
            .field("flushed", &self.flushed)
            .finish_non_exhaustive()
    }
}

impl Default for Tessellator {
    fn default() -> Self {
        Self::new(TessConfig::default())
    }
}

impl Tessellator {
    /// A tessellator using lyon for polygon triangulation.
    #[must_use]
    pub fn new(config: TessConfig) -> Self {
        Self {
            config,
            registry: AttribRegistry::new(),
            attrib_values: Vec::new(),
            style: Style::default(),
            shape: None,
            contour_open: false,
            normal_set: false,
            raw: RawGeometry::new(),
            flat: RawGeometry::new(),
            flattener: CurveFlattener::new(&config),
            triangulator: Box::new(LyonTriangulator::new()),
            geometry: TessGeometry::default(),
            depth_sort: false,
            projection: Box::new(IdentityProjection),
            sorter: DepthSorter::new(config.sort_epsilon),
            flushed: false,
            sorted: false,
        }
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &TessConfig {
        &self.config
    }

    /// Replace the settings. Takes effect for the next shape.
    pub fn set_config(&mut self, config: TessConfig) {
        self.flattener = CurveFlattener::new(&config);
        self.sorter = DepthSorter::new(config.sort_epsilon);
        self.config = config;
    }

    /// Replace the polygon triangulation engine.
    pub fn set_triangulator(&mut self, triangulator: impl PolygonTriangulator + 'static) {
        self.triangulator = Box::new(triangulator);
    }

    /// Current drawing state.
    #[must_use]
    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Declared generic attributes.
    #[must_use]
    pub fn attribs(&self) -> &AttribRegistry {
        &self.registry
    }

    /// Geometry recorded since the last frame started.
    #[must_use]
    pub fn geometry(&self) -> &TessGeometry {
        &self.geometry
    }

    /// Set the fill color.
    pub fn set_fill(&mut self, color: Rgba) {
        self.style.fill = color;
    }

    /// Set the stroke color.
    pub fn set_stroke(&mut self, color: Rgba) {
        self.style.stroke = color;
    }

    /// Set the stroke weight.
    pub fn set_stroke_weight(&mut self, weight: f32) {
        self.style.stroke_weight = weight;
    }

    /// Set the stroke cap.
    pub fn set_stroke_cap(&mut self, cap: StrokeCap) {
        self.style.cap = cap;
    }

    /// Set the stroke join.
    pub fn set_stroke_join(&mut self, join: StrokeJoin) {
        self.style.join = join;
    }

    /// Set the normal of new vertices. Inside a shape this also turns off
    /// automatic normals for it.
    pub fn set_normal(&mut self, normal: [f32; 3]) {
        self.style.normal = normal;
        if self.shape.is_some() {
            self.normal_set = true;
        }
    }

    /// Set the texture coordinate of new vertices.
    pub fn set_texcoord(&mut self, uv: [f32; 2]) {
        self.style.texcoord = uv;
    }

    /// Set the material of new vertices.
    pub fn set_material(&mut self, material: Material) {
        self.style.material = material;
    }

    /// Bind a texture (or none) to the fill of the current shape.
    pub fn set_texture(&mut self, texture: Option<TextureId>) {
        self.style.texture = texture;
    }

    /// Set the model matrix.
    pub fn set_model(&mut self, model: Mat4) {
        self.style.model = model;
    }

    /// Declare a generic vertex attribute.
    ///
    /// # Errors
    ///
    /// See [`AttribRegistry::define`].
    pub fn define_attrib(&mut self, name: &str, format: AttribFormat) -> Result<AttribId, TessError> {
        let id = self.registry.define(name, format)?;
        self.attrib_values.resize(self.registry.len(), [0.0; 4]);
        Ok(id)
    }

    /// Set the value of a generic attribute for new vertices. Extra
    /// components beyond the attribute's arity are ignored.
    ///
    /// # Errors
    ///
    /// [`TessError::UnknownAttribute`] if `name` was never declared.
    pub fn set_attrib(&mut self, name: &str, values: &[f64]) -> Result<(), TessError> {
        let id = self
            .registry
            .lookup(name)
            .ok_or_else(|| TessError::UnknownAttribute(name.to_owned()))?;
        let arity = self.registry.format(id).width();
        let slot = &mut self.attrib_values[id.index()];
        *slot = [0.0; 4];
        for (dst, src) in slot.iter_mut().zip(values).take(arity) {
            *dst = *src;
        }
        Ok(())
    }

    /// Toggle depth sorting of the fill geometry in [`flush`](Self::flush).
    pub fn enable_depth_sort(&mut self, enabled: bool) {
        if enabled != self.depth_sort {
            self.sorted = false;
        }
        self.depth_sort = enabled;
    }

    /// Set the projection used by the depth sorter.
    pub fn set_projection(&mut self, projection: impl Projection + 'static) {
        self.projection = Box::new(projection);
        self.sorted = false;
    }

    /// Start recording a shape.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] when a shape is already being recorded.
    pub fn begin_shape(&mut self, kind: ShapeKind) -> Result<(), TessError> {
        if self.shape.is_some() {
            return Err(TessError::ShapeState("begin_shape inside a shape"));
        }
        if self.flushed {
            self.geometry.clear();
            self.flushed = false;
        }
        self.raw.clear();
        self.shape = Some(kind);
        self.contour_open = false;
        self.normal_set = false;
        Ok(())
    }

    fn current(&self, position: [f32; 3]) -> VertexAttrs {
        VertexAttrs {
            position,
            fill: self.style.fill,
            normal: self.style.normal,
            texcoord: self.style.texcoord,
            stroke: self.style.stroke,
            stroke_weight: self.style.stroke_weight,
            material: self.style.material,
        }
    }

    fn require_shape(&self, what: &'static str) -> Result<ShapeKind, TessError> {
        self.shape.ok_or(TessError::ShapeState(what))
    }

    /// Add a vertex with the current style.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a shape.
    pub fn vertex(&mut self, position: [f32; 3]) -> Result<(), TessError> {
        self.require_shape("vertex outside begin_shape/end_shape")?;
        let v = self.current(position);
        self.raw
            .add_vertex(&v, &self.attrib_values, &self.registry, VertexCode::Plain);
        Ok(())
    }

    /// Add a vertex with an explicit texture coordinate.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a shape.
    pub fn vertex_uv(&mut self, position: [f32; 3], uv: [f32; 2]) -> Result<(), TessError> {
        self.style.texcoord = uv;
        self.vertex(position)
    }

    fn require_anchor(&self, what: &'static str) -> Result<(), TessError> {
        if self.require_shape(what)? != ShapeKind::Polygon || self.raw.is_empty() {
            return Err(TessError::ShapeState(what));
        }
        Ok(())
    }

    /// Add a cubic Bézier from the previous vertex through `c1`, `c2` to
    /// `anchor`.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a polygon or without a preceding
    /// vertex.
    pub fn bezier_vertex(&mut self, c1: [f32; 3], c2: [f32; 3], anchor: [f32; 3]) -> Result<(), TessError> {
        self.require_anchor("bezier_vertex needs a preceding vertex in a polygon")?;
        self.raw.add_code(VertexCode::BezierControl);
        for p in [c1, c2, anchor] {
            let v = self.current(p);
            self.raw.push_vertex(&v, &self.attrib_values, &self.registry);
        }
        Ok(())
    }

    /// Add a quadratic Bézier from the previous vertex through `control`
    /// to `anchor`.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a polygon or without a preceding
    /// vertex.
    pub fn quadratic_vertex(&mut self, control: [f32; 3], anchor: [f32; 3]) -> Result<(), TessError> {
        self.require_anchor("quadratic_vertex needs a preceding vertex in a polygon")?;
        self.raw.add_code(VertexCode::QuadraticControl);
        for p in [control, anchor] {
            let v = self.current(p);
            self.raw.push_vertex(&v, &self.attrib_values, &self.registry);
        }
        Ok(())
    }

    /// Add a Catmull-Rom spline vertex.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a polygon.
    pub fn curve_vertex(&mut self, position: [f32; 3]) -> Result<(), TessError> {
        if self.require_shape("curve_vertex outside begin_shape/end_shape")? != ShapeKind::Polygon {
            return Err(TessError::ShapeState("curve_vertex outside a polygon"));
        }
        let v = self.current(position);
        self.raw
            .add_vertex(&v, &self.attrib_values, &self.registry, VertexCode::CurveControl);
        Ok(())
    }

    /// Start a new contour (a hole, or a separate outline) of the current
    /// polygon.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a polygon or inside an open
    /// contour.
    pub fn begin_contour(&mut self) -> Result<(), TessError> {
        if self.require_shape("begin_contour outside begin_shape/end_shape")? != ShapeKind::Polygon {
            return Err(TessError::ShapeState("begin_contour outside a polygon"));
        }
        if self.contour_open {
            return Err(TessError::ShapeState("begin_contour inside a contour"));
        }
        if !self.raw.is_empty() {
            self.raw.add_code(VertexCode::Break);
        }
        self.contour_open = true;
        Ok(())
    }

    /// Close the contour opened by [`begin_contour`](Self::begin_contour).
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] without an open contour.
    pub fn end_contour(&mut self) -> Result<(), TessError> {
        if !self.contour_open {
            return Err(TessError::ShapeState("end_contour without begin_contour"));
        }
        self.contour_open = false;
        Ok(())
    }

    fn spec(&self, kind: ShapeKind, end: EndShape) -> ShapeSpec {
        ShapeSpec {
            kind,
            end,
            stroke: StrokeStyle {
                cap: self.style.cap,
                join: self.style.join,
            },
            texture: self.style.texture,
            auto_normals: !self.normal_set,
        }
    }

    fn transform(&self) -> Option<VertexTransform> {
        (self.config.transform_ahead && self.style.model != Mat4::IDENTITY)
            .then(|| VertexTransform::new(self.style.model))
    }

    /// Borrow the pipeline state apart from the recording store and output.
    pub(crate) fn context(&mut self, transform: Option<VertexTransform>) -> ShapeContext<'_> {
        ShapeContext {
            config: &self.config,
            registry: &self.registry,
            flattener: &self.flattener,
            triangulator: self.triangulator.as_mut(),
            flat: &mut self.flat,
            transform,
        }
    }

    /// Finish the current shape and tessellate it into the frame.
    ///
    /// A shape the triangulator rejects is reported through
    /// [`ShapeReport::dropped_fill`] / [`ShapeReport::dropped_stroke`] and
    /// does not fail the call.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a shape;
    /// [`TessError::CapacityExceeded`] when a primitive of the shape cannot
    /// fit an empty index block, in which case nothing of it is kept.
    pub fn end_shape(&mut self, end: EndShape) -> Result<ShapeReport, TessError> {
        let kind = self.require_shape("end_shape without begin_shape")?;
        let spec = self.spec(kind, end);
        let transform = self.transform();
        self.shape = None;
        self.contour_open = false;
        self.sorted = false;
        let raw = std::mem::take(&mut self.raw);
        let mut geometry = std::mem::take(&mut self.geometry);
        let result = self.context(transform).run(&raw, &spec, &mut geometry);
        self.geometry = geometry;
        self.raw = raw;
        result
    }

    /// Finish the current shape as a [`RetainedShape`] instead of adding it
    /// to the frame.
    ///
    /// # Errors
    ///
    /// [`TessError::ShapeState`] outside a shape.
    pub fn end_retained(&mut self, end: EndShape) -> Result<RetainedShape, TessError> {
        let kind = self.require_shape("end_retained without begin_shape")?;
        let spec = self.spec(kind, end);
        self.shape = None;
        self.contour_open = false;
        Ok(RetainedShape::new(std::mem::take(&mut self.raw), spec))
    }

    fn sort(&mut self) {
        let fill = &self.geometry.fill;
        let projection = &self.projection;
        let triangles: Vec<[Vec3; 3]> = fill
            .triangles()
            .map(|t| t.map(|v| Vec3::from(projection.project(fill.positions()[v]))))
            .collect();
        let order = self.sorter.sort(&triangles).to_vec();
        self.geometry
            .fill
            .reorder_triangles(&order, &mut self.geometry.textures);
    }

    /// Hand out the frame recorded so far.
    ///
    /// Flushing is idempotent: calling it again without recording returns
    /// the same batches. The next [`begin_shape`](Self::begin_shape) clears
    /// the frame.
    pub fn flush(&mut self) -> Frame<'_> {
        if self.depth_sort && !self.sorted {
            self.sort();
        }
        self.sorted = true;
        self.flushed = true;
        Frame::new(&self.geometry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attribs::{AttribKind, AttribType};

    fn square(tess: &mut Tessellator, x: f32, size: f32) {
        for p in [[x, 0.0], [x + size, 0.0], [x + size, size], [x, size]] {
            tess.vertex([p[0], p[1], 0.0]).unwrap();
        }
    }

    #[test]
    fn vertex_outside_a_shape_is_rejected() {
        let mut tess = Tessellator::default();
        assert!(matches!(tess.vertex([0.0; 3]), Err(TessError::ShapeState(_))));
        assert!(matches!(tess.end_shape(EndShape::closed()), Err(TessError::ShapeState(_))));
    }

    #[test]
    fn bezier_needs_an_anchor() {
        let mut tess = Tessellator::default();
        tess.begin_shape(ShapeKind::Polygon).unwrap();
        assert!(tess.bezier_vertex([0.0; 3], [1.0; 3], [2.0; 3]).is_err());
        tess.vertex([0.0; 3]).unwrap();
        tess.bezier_vertex([0.0, 10.0, 0.0], [10.0, 10.0, 0.0], [10.0, 0.0, 0.0]).unwrap();
        let report = tess.end_shape(EndShape::closed().with_stroke(false)).unwrap();
        assert!(report.triangles > 0);
    }

    #[test]
    fn filled_square_is_textured_and_stroked() {
        let mut tess = Tessellator::default();
        tess.set_texture(Some(TextureId(5)));
        tess.begin_shape(ShapeKind::Polygon).unwrap();
        square(&mut tess, 0.0, 10.0);
        let report = tess.end_shape(EndShape::closed()).unwrap();
        assert_eq!(report.triangles, 2);
        assert_eq!(report.stroke_path, Some(StrokePath::Quads));
        assert_eq!(report.line_segments, 4);
        let frame = tess.flush();
        assert_eq!(frame.texture_batches.len(), 1);
        assert_eq!(frame.fill_draws[0].texture, Some(TextureId(5)));
        assert_eq!(frame.line_draws.len(), 1);
    }

    #[test]
    fn thick_round_stroke_goes_to_the_fill() {
        let mut tess = Tessellator::default();
        tess.set_stroke_weight(8.0);
        tess.begin_shape(ShapeKind::Polygon).unwrap();
        square(&mut tess, 0.0, 50.0);
        let report = tess.end_shape(EndShape::closed().with_fill(false)).unwrap();
        assert_eq!(report.stroke_path, Some(StrokePath::Outline));
        assert!(report.triangles > 0);
        let frame = tess.flush();
        assert!(frame.line.indices().is_empty());
        assert_eq!(frame.texture_batches[0].texture, None);
    }

    #[test]
    fn capacity_errors_keep_nothing() {
        let mut tess = Tessellator::new(TessConfig::default().with_max_vertex_index(16));
        tess.set_stroke_weight(1000.0);
        tess.begin_shape(ShapeKind::Points).unwrap();
        tess.vertex([0.0; 3]).unwrap();
        let err = tess.end_shape(EndShape::open()).unwrap_err();
        assert!(matches!(err, TessError::CapacityExceeded { max: 16, .. }));
        assert!(tess.geometry().is_empty());
    }

    #[test]
    fn attributes_must_be_declared() {
        let mut tess = Tessellator::default();
        assert_eq!(
            tess.set_attrib("weight", &[1.0]),
            Err(TessError::UnknownAttribute("weight".into()))
        );
        tess.define_attrib("weight", AttribFormat::new(AttribKind::Other, AttribType::Float, 1))
            .unwrap();
        tess.set_attrib("weight", &[0.5, 9.0]).unwrap();
        tess.begin_shape(ShapeKind::Triangles).unwrap();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            tess.vertex(p).unwrap();
        }
        tess.end_shape(EndShape::open().with_stroke(false)).unwrap();
        let frame = tess.flush();
        assert_eq!(frame.fill.attrib(0).unwrap().get(2, 1)[0], 0.5);
    }

    #[test]
    fn transform_ahead_applies_the_model_matrix() {
        let mut tess = Tessellator::new(TessConfig::default().with_transform_ahead(true));
        tess.set_model(Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)));
        tess.begin_shape(ShapeKind::Triangles).unwrap();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            tess.vertex(p).unwrap();
        }
        tess.end_shape(EndShape::open().with_stroke(false)).unwrap();
        assert_eq!(tess.flush().fill.positions()[0], [100.0, 0.0, 0.0]);
    }

    #[test]
    fn non_flat_shapes_get_face_normals() {
        let mut tess = Tessellator::default();
        tess.begin_shape(ShapeKind::Triangles).unwrap();
        for p in [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]] {
            tess.vertex(p).unwrap();
        }
        tess.end_shape(EndShape::open().with_stroke(false)).unwrap();
        assert_eq!(tess.flush().fill.normals()[0], [1.0, 0.0, 0.0]);
    }
}
