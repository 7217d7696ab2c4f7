//! Immediate-mode vector geometry tessellation into GPU-ready batches.
//!
//! A [`Tessellator`] records shapes (polygons with Bézier and Catmull-Rom
//! segments and holes, triangle lists, fans, strips, lines and points) one
//! at a time and turns each into three kinds of indexed geometry:
//!
//! - **fill** triangles, triangulated via [lyon] for polygons, tagged with
//!   the texture that was bound;
//! - **line** quads for thin strokes, extruded in screen space by the
//!   vertex stage;
//! - **point** sprites, also expanded in screen space.
//!
//! Thick or round strokes are outlined on the CPU and triangulated into the
//! fill geometry instead.
//!
//! All output is split into index blocks that never reference more than
//! [`TessConfig::max_vertex_index`] vertices, so every draw can use `u16`
//! indices. [`Tessellator::flush`] hands out the frame as column arrays
//! plus one [`DrawRange`] per texture batch and block, optionally after
//! back-to-front depth sorting of the fill triangles.
//!
//! # Features
//!
//! - **`glow`** (default): an OpenGL 3.1 backend, [`gl::GlRenderer`], that
//!   uploads frames and issues the draws. GPU objects live in a
//!   generation-checked [`gpu::ResourceRegistry`] and are rebuilt after a
//!   context loss.
//!
//! [lyon]: https://docs.rs/lyon

pub mod attribs;
pub mod batch;
mod config;
pub mod curve;
pub mod depth;
mod error;
pub mod fill;
#[cfg(feature = "glow")]
pub mod gl;
pub mod gpu;
mod raw;
mod retained;
#[cfg(feature = "glow")]
mod shaders;
pub mod stroke;
mod tessellator;
pub mod texture;
pub mod triangulator;
mod types;

pub use attribs::{AttribFormat, AttribId, AttribKind, AttribType};
pub use batch::{FillGeometry, IndexBlock, IndexCache, LineGeometry, PointGeometry, TessGeometry};
pub use config::{TessConfig, MAX_INDEX_WIDTH};
pub use depth::{DepthSorter, Projection};
pub use error::{TessError, TriangulationError};
pub use raw::RawGeometry;
pub use retained::RetainedShape;
pub use tessellator::{Frame, ShapeReport, Style, Tessellator};
pub use texture::{DrawRange, TextureBatch};
pub use triangulator::{LyonTriangulator, PolygonTriangulator, WindingRule};
pub use types::{
    Edge, EdgeKind, EndShape, Material, Rgba, ShapeKind, StrokeCap, StrokeJoin, TextureId,
    VertexAttrs, VertexCode, BLACK, WHITE,
};
