//! Plain data types shared by the recording API and the tessellators.

/// An 8-bit RGBA color, straight (not premultiplied) alpha.
pub type Rgba = [u8; 4];

/// Opaque white.
pub const WHITE: Rgba = [255, 255, 255, 255];
/// Opaque black.
pub const BLACK: Rgba = [0, 0, 0, 255];

/// Identity of an externally owned texture.
///
/// The tessellator never looks inside a texture; it only compares ids to
/// decide where a [`TextureBatch`](crate::texture::TextureBatch) starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Lighting material channels carried per vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Ambient reflectance.
    pub ambient: Rgba,
    /// Specular reflectance.
    pub specular: Rgba,
    /// Emitted light.
    pub emissive: Rgba,
    /// Specular exponent.
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: [204, 204, 204, 255],
            specular: [128, 128, 128, 255],
            emissive: BLACK,
            shininess: 1.0,
        }
    }
}

/// The built-in attributes of one submitted vertex.
///
/// Generic attributes declared through
/// [`Tessellator::define_attrib`](crate::Tessellator::define_attrib) travel
/// next to these in the raw store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttrs {
    /// Model-space position.
    pub position: [f32; 3],
    /// Fill color.
    pub fill: Rgba,
    /// Surface normal.
    pub normal: [f32; 3],
    /// Texture coordinate.
    pub texcoord: [f32; 2],
    /// Stroke color.
    pub stroke: Rgba,
    /// Stroke weight in pixels.
    pub stroke_weight: f32,
    /// Lighting material.
    pub material: Material,
}

impl Default for VertexAttrs {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            fill: WHITE,
            normal: [0.0, 0.0, 1.0],
            texcoord: [0.0; 2],
            stroke: BLACK,
            stroke_weight: 1.0,
            material: Material::default(),
        }
    }
}

impl VertexAttrs {
    /// The same attributes at another position.
    #[must_use]
    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }
}

/// Command codes stored alongside raw vertices.
///
/// Each code consumes a fixed number of vertices from the raw vertex
/// columns; see [`VertexCode::vertex_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexCode {
    /// One ordinary vertex.
    Plain,
    /// Cubic Bézier: first control point, second control point, anchor.
    BezierControl,
    /// Quadratic Bézier: control point, anchor.
    QuadraticControl,
    /// One Catmull-Rom spline vertex.
    CurveControl,
    /// Starts a new contour without closing the previous one.
    Break,
}

impl VertexCode {
    /// Number of raw vertices this code consumes.
    #[must_use]
    pub const fn vertex_count(self) -> usize {
        match self {
            Self::Plain | Self::CurveControl => 1,
            Self::BezierControl => 3,
            Self::QuadraticControl => 2,
            Self::Break => 0,
        }
    }
}

/// Position of an edge within its stroke contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Interior edge: joins at both ends.
    Middle,
    /// First edge of a contour: cap (or closing join) at `a`.
    Start,
    /// Last edge of an open contour: cap at `b`.
    End,
    /// Single-edge contour: caps at both ends.
    Isolated,
    /// Last edge of a closed contour: joins back into the contour's start.
    Close,
}

impl EdgeKind {
    /// Whether this edge opens a contour.
    #[must_use]
    pub const fn starts_contour(self) -> bool {
        matches!(self, Self::Start | Self::Isolated)
    }

    /// Whether this edge terminates a contour.
    #[must_use]
    pub const fn ends_contour(self) -> bool {
        matches!(self, Self::End | Self::Isolated | Self::Close)
    }
}

/// A stroke segment between two raw vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Index of the first vertex.
    pub a: u32,
    /// Index of the second vertex.
    pub b: u32,
    /// Position of the edge within its contour.
    pub kind: EdgeKind,
}

/// The primitive a shape's vertices describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShapeKind {
    /// Every vertex is a point.
    Points,
    /// Every pair of vertices is a line.
    Lines,
    /// Every triple of vertices is a triangle.
    Triangles,
    /// A fan around the first vertex.
    TriangleFan,
    /// A strip of triangles.
    TriangleStrip,
    /// Every four vertices are a quad.
    Quads,
    /// A strip of quads.
    QuadStrip,
    /// A polygon, possibly with curves and holes.
    #[default]
    Polygon,
}

/// How stroke ends are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrokeCap {
    /// Flush with the endpoint.
    Butt,
    /// Extended by half the weight.
    Square,
    /// Half disc beyond the endpoint.
    #[default]
    Round,
}

/// How consecutive stroke segments are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrokeJoin {
    /// Sharp corner, limited by the miter limit.
    #[default]
    Miter,
    /// Corner cut straight across.
    Bevel,
    /// Rounded corner.
    Round,
}

/// Parameters of [`Tessellator::end_shape`](crate::Tessellator::end_shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndShape {
    /// Connect the last vertex back to the first.
    pub close: bool,
    /// Generate fill geometry.
    pub fill: bool,
    /// Generate stroke geometry.
    pub stroke: bool,
}

impl Default for EndShape {
    fn default() -> Self {
        Self {
            close: false,
            fill: true,
            stroke: true,
        }
    }
}

impl EndShape {
    /// A closed shape, filled and stroked.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            close: true,
            ..Self::default()
        }
    }

    /// An open shape, filled and stroked.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Override the fill flag.
    #[must_use]
    pub fn with_fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    /// Override the stroke flag.
    #[must_use]
    pub fn with_stroke(mut self, stroke: bool) -> Self {
        self.stroke = stroke;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_vertex_counts() {
        assert_eq!(VertexCode::Plain.vertex_count(), 1);
        assert_eq!(VertexCode::BezierControl.vertex_count(), 3);
        assert_eq!(VertexCode::QuadraticControl.vertex_count(), 2);
        assert_eq!(VertexCode::CurveControl.vertex_count(), 1);
        assert_eq!(VertexCode::Break.vertex_count(), 0);
    }

    #[test]
    fn edge_kind_contour_bounds() {
        assert!(EdgeKind::Isolated.starts_contour() && EdgeKind::Isolated.ends_contour());
        assert!(!EdgeKind::Middle.starts_contour() && !EdgeKind::Middle.ends_contour());
        assert!(EdgeKind::Close.ends_contour());
    }
}
