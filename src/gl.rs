//! OpenGL backend via [glow]: buffer and texture lifecycle plus draw
//! submission for a flushed [`Frame`].
//!
//! Draws target OpenGL 3.1, which has no base-vertex draws, so each
//! [`DrawRange`] rebinds the attribute pointers at its block's vertex
//! offset before issuing `glDrawElements` with `u16` indices.
//!
//! [glow]: https://docs.rs/glow

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;
use glow::{HasContext, PixelUnpackData};

use crate::error::TessError;
use crate::gpu::{BatchBuffers, BufferKind, Column, ContextGeneration, GpuBackend, GpuResources, ResourceHandle};
use crate::shaders;
use crate::tessellator::Frame;
use crate::texture::DrawRange;
use crate::types::TextureId;

/// GL internal format for RGBA8 textures, pre-cast to the `i32` that
/// `tex_image_2d` expects.
#[expect(clippy::cast_possible_wrap)]
const RGBA8_INTERNAL_FORMAT: i32 = glow::RGBA8 as i32;

/// Convert a size or count to `i32` for GL API calls.
fn gl_int(value: usize) -> Result<i32, TessError> {
    i32::try_from(value).map_err(|_| TessError::Gpu(format!("{value} exceeds the GL integer range")))
}

/// Byte offset of vertex `vertex` in a column of `stride`-byte elements.
fn attribute_offset(vertex: usize, stride: usize) -> Result<i32, TessError> {
    gl_int(vertex * stride)
}

fn target(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Vertex => glow::ARRAY_BUFFER,
        BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

/// [`GpuBackend`] over a shared glow context.
pub struct GlBackend {
    gl: Arc<glow::Context>,
    generation: ContextGeneration,
}

impl std::fmt::Debug for GlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlBackend")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl GlBackend {
    /// Wrap `gl`.
    ///
    /// # Safety
    ///
    /// `gl` must be current on this thread whenever the backend is used.
    pub unsafe fn new(gl: Arc<glow::Context>) -> Self {
        Self {
            gl,
            generation: ContextGeneration::default(),
        }
    }

    /// The wrapped context.
    #[must_use]
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Switch to a recreated context. Everything created before becomes
    /// stale.
    ///
    /// # Safety
    ///
    /// As for [`new`](Self::new).
    pub unsafe fn replace_context(&mut self, gl: Arc<glow::Context>) {
        self.gl = gl;
        self.generation = ContextGeneration(self.generation.0.wrapping_add(1));
        log::warn!("GL context replaced, now generation {}", self.generation.0);
    }
}

impl GpuBackend for GlBackend {
    type Buffer = glow::Buffer;
    type Texture = glow::Texture;

    fn generation(&self) -> ContextGeneration {
        self.generation
    }

    fn create_buffer(&mut self, _kind: BufferKind) -> Result<glow::Buffer, TessError> {
        unsafe { self.gl.create_buffer() }.map_err(TessError::Gpu)
    }

    fn upload_buffer(&mut self, buffer: &glow::Buffer, kind: BufferKind, data: &[u8]) {
        unsafe {
            self.gl.bind_buffer(target(kind), Some(*buffer));
            self.gl.buffer_data_u8_slice(target(kind), data, glow::STREAM_DRAW);
        }
    }

    fn destroy_buffer(&mut self, buffer: glow::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) };
    }

    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<glow::Texture, TessError> {
        let (w, h) = (gl_int(width as usize)?, gl_int(height as usize)?);
        let gl = &self.gl;
        let texture = unsafe { gl.create_texture() }.map_err(TessError::Gpu)?;
        // GL constant values are small enough that the cast is always safe.
        #[expect(clippy::cast_possible_wrap)]
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                RGBA8_INTERNAL_FORMAT,
                w,
                h,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pixels)),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(texture)
    }

    fn bind_texture(&mut self, texture: Option<&glow::Texture>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.bind_texture(glow::TEXTURE_2D, texture.copied());
        }
    }

    fn destroy_texture(&mut self, texture: glow::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }
}

/// Uniform locations shared by the three programs.
struct Uniforms {
    /// `u_transform`: model-view-projection matrix.
    transform: glow::UniformLocation,
    /// `u_viewport` (line and point programs) or `u_textured` (fill).
    extra: glow::UniformLocation,
    /// `u_texture` (fill program only).
    texture: Option<glow::UniformLocation>,
}

struct Program {
    program: glow::Program,
    uniforms: Uniforms,
}

/// The three attribute columns a program reads, with element size and
/// component count.
struct Layout {
    columns: [(Column, usize, i32); 3],
    indices: Column,
}

const FILL_LAYOUT: Layout = Layout {
    columns: [
        (Column::FillPositions, 12, 3),
        (Column::FillColors, 4, 4),
        (Column::FillTexcoords, 8, 2),
    ],
    indices: Column::FillIndices,
};

const LINE_LAYOUT: Layout = Layout {
    columns: [
        (Column::LinePositions, 12, 3),
        (Column::LineColors, 4, 4),
        (Column::LineDirections, 16, 4),
    ],
    indices: Column::LineIndices,
};

const POINT_LAYOUT: Layout = Layout {
    columns: [
        (Column::PointPositions, 12, 3),
        (Column::PointColors, 4, 4),
        (Column::PointOffsets, 8, 2),
    ],
    indices: Column::PointIndices,
};

unsafe fn uniform(gl: &glow::Context, program: glow::Program, name: &str) -> Result<glow::UniformLocation, TessError> {
    unsafe { gl.get_uniform_location(program, name) }
        .ok_or_else(|| TessError::Gpu(format!("{name} missing from shader")))
}

impl Program {
    unsafe fn new(
        gl: &glow::Context,
        vertex: &str,
        fragment: &str,
        attributes: &[&str],
        extra: &str,
        texture: bool,
    ) -> Result<Self, TessError> {
        let program = unsafe { shaders::compile_program(gl, vertex, fragment, attributes)? };
        let uniforms = unsafe {
            Uniforms {
                transform: uniform(gl, program, "u_transform")?,
                extra: uniform(gl, program, extra)?,
                texture: if texture {
                    Some(uniform(gl, program, "u_texture")?)
                } else {
                    None
                },
            }
        };
        Ok(Self { program, uniforms })
    }
}

struct Programs {
    fill: Program,
    line: Program,
    point: Program,
    vao: glow::VertexArray,
}

impl Programs {
    unsafe fn new(gl: &glow::Context) -> Result<Self, TessError> {
        unsafe {
            Ok(Self {
                fill: Program::new(
                    gl,
                    shaders::FILL_VERTEX_SRC,
                    shaders::FILL_FRAGMENT_SRC,
                    &shaders::FILL_ATTRIBUTES,
                    "u_textured",
                    true,
                )?,
                line: Program::new(
                    gl,
                    shaders::LINE_VERTEX_SRC,
                    shaders::COLOR_FRAGMENT_SRC,
                    &shaders::LINE_ATTRIBUTES,
                    "u_viewport",
                    false,
                )?,
                point: Program::new(
                    gl,
                    shaders::POINT_VERTEX_SRC,
                    shaders::COLOR_FRAGMENT_SRC,
                    &shaders::POINT_ATTRIBUTES,
                    "u_viewport",
                    false,
                )?,
                vao: gl.create_vertex_array().map_err(TessError::Gpu)?,
            })
        }
    }

    unsafe fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.fill.program);
            gl.delete_program(self.line.program);
            gl.delete_program(self.point.program);
            gl.delete_vertex_array(self.vao);
        }
    }
}

struct TextureEntry {
    image: image::RgbaImage,
    handle: Option<ResourceHandle>,
}

/// Uploads flushed frames and draws them.
///
/// # Example
///
/// ```no_run
/// # use polybatch::{gl::GlRenderer, EndShape, ShapeKind, Tessellator};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) -> Result<(), polybatch::TessError> {
/// let mut renderer = unsafe { GlRenderer::new(gl)? };
/// let mut tess = Tessellator::default();
/// tess.begin_shape(ShapeKind::Polygon)?;
/// tess.vertex([10.0, 10.0, 0.0])?;
/// tess.vertex([90.0, 10.0, 0.0])?;
/// tess.vertex([50.0, 80.0, 0.0])?;
/// tess.end_shape(EndShape::closed())?;
/// let frame = tess.flush();
/// unsafe { renderer.render(&frame, glam::Mat4::IDENTITY, [800, 600])? };
/// # Ok(())
/// # }
/// ```
pub struct GlRenderer {
    gpu: GpuResources<GlBackend>,
    buffers: BatchBuffers,
    programs: Programs,
    textures: HashMap<TextureId, TextureEntry>,
    next_texture: u64,
}

impl std::fmt::Debug for GlRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlRenderer")
            .field("gpu", &self.gpu)
            .field("textures", &self.textures.len())
            .finish_non_exhaustive()
    }
}

impl GlRenderer {
    /// Compile the shader programs.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid. The caller must ensure
    /// that [`destroy`](Self::destroy) is called before the context is
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`TessError::Gpu`] if shader compilation, program linking, or GL
    /// object creation fails.
    pub unsafe fn new(gl: Arc<glow::Context>) -> Result<Self, TessError> {
        let programs = unsafe { Programs::new(&gl)? };
        Ok(Self {
            gpu: GpuResources::new(unsafe { GlBackend::new(gl) }),
            buffers: BatchBuffers::new(),
            programs,
            textures: HashMap::new(),
            next_texture: 0,
        })
    }

    /// Resource registries and backend.
    #[must_use]
    pub fn resources(&self) -> &GpuResources<GlBackend> {
        &self.gpu
    }

    /// Register an image for use as a fill texture. It is uploaded the first
    /// time a batch draws with it, and again after a context loss.
    pub fn add_texture(&mut self, image: image::RgbaImage) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id, TextureEntry { image, handle: None });
        id
    }

    /// Forget a texture; its GL object is deleted by a later sweep.
    pub fn remove_texture(&mut self, id: TextureId) {
        if let Some(TextureEntry { handle: Some(h), .. }) = self.textures.remove(&id) {
            self.gpu.release_texture(h);
        }
    }

    /// Switch to a recreated context: programs are rebuilt now, buffers and
    /// textures on their next use.
    ///
    /// # Safety
    ///
    /// `gl` must be current. The old context is gone, so its objects are
    /// not deleted.
    ///
    /// # Errors
    ///
    /// As for [`new`](Self::new).
    pub unsafe fn replace_context(&mut self, gl: Arc<glow::Context>) -> Result<(), TessError> {
        self.programs = unsafe { Programs::new(&gl)? };
        unsafe { self.gpu.backend_mut().replace_context(gl) };
        Ok(())
    }

    fn texture_handle(&mut self, id: TextureId) -> Result<Option<ResourceHandle>, TessError> {
        let Some(entry) = self.textures.get_mut(&id) else {
            log::warn!("drawing with unknown texture {id:?}");
            return Ok(None);
        };
        if let Some(handle) = entry.handle {
            if self.gpu.texture_valid(handle) {
                return Ok(Some(handle));
            }
            self.gpu.release_texture(handle);
        }
        let (width, height) = entry.image.dimensions();
        let handle = self.gpu.create_texture(width, height, entry.image.as_raw())?;
        entry.handle = Some(handle);
        Ok(Some(handle))
    }

    unsafe fn bind_columns(&self, layout: &Layout, vertex_offset: usize) -> Result<(), TessError> {
        let gl = self.gpu.backend().gl();
        for (location, &(column, size, components)) in (0u32..).zip(&layout.columns) {
            let buffer = self
                .buffers
                .handle(column)
                .and_then(|h| self.gpu.buffer(h))
                .copied();
            let normalized = matches!(
                column,
                Column::FillColors | Column::LineColors | Column::PointColors
            );
            let ty = if normalized { glow::UNSIGNED_BYTE } else { glow::FLOAT };
            unsafe {
                gl.bind_buffer(glow::ARRAY_BUFFER, buffer);
                gl.enable_vertex_attrib_array(location);
                gl.vertex_attrib_pointer_f32(
                    location,
                    components,
                    ty,
                    normalized,
                    gl_int(size)?,
                    attribute_offset(vertex_offset, size)?,
                );
            }
        }
        let indices = self
            .buffers
            .handle(layout.indices)
            .and_then(|h| self.gpu.buffer(h))
            .copied();
        unsafe { gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, indices) };
        Ok(())
    }

    unsafe fn draw(&self, layout: &Layout, range: &DrawRange) -> Result<(), TessError> {
        unsafe {
            self.bind_columns(layout, range.vertex_offset)?;
            self.gpu.backend().gl().draw_elements(
                glow::TRIANGLES,
                gl_int(range.index_count)?,
                glow::UNSIGNED_SHORT,
                gl_int(range.index_offset * 2)?,
            );
        }
        Ok(())
    }

    /// Upload `frame` and draw its fill, then its strokes, then its points.
    ///
    /// Releases at most a bounded number of dead GL objects per call.
    ///
    /// # Safety
    ///
    /// Requires the current GL context passed to [`new`](Self::new) or
    /// [`replace_context`](Self::replace_context).
    ///
    /// # Errors
    ///
    /// [`TessError::Gpu`] when buffers or textures cannot be created.
    #[expect(clippy::cast_precision_loss)]
    pub unsafe fn render(&mut self, frame: &Frame<'_>, transform: Mat4, [width, height]: [u32; 2]) -> Result<(), TessError> {
        self.buffers.upload(&mut self.gpu, frame)?;
        let matrix = transform.to_cols_array();
        let viewport = [width as f32, height as f32];

        unsafe {
            let gl = self.gpu.backend().gl();
            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
            gl.bind_vertex_array(Some(self.programs.vao));

            let fill = &self.programs.fill;
            gl.use_program(Some(fill.program));
            gl.uniform_matrix_4_f32_slice(Some(&fill.uniforms.transform), false, &matrix);
            gl.uniform_1_i32(fill.uniforms.texture.as_ref(), 0);
        }
        for range in &frame.fill_draws {
            let handle = match range.texture {
                Some(id) => self.texture_handle(id)?,
                None => None,
            };
            let textured = self.gpu.bind_texture(handle) && handle.is_some();
            unsafe {
                self.gpu.backend().gl().uniform_1_i32(
                    Some(&self.programs.fill.uniforms.extra),
                    i32::from(textured),
                );
                self.draw(&FILL_LAYOUT, range)?;
            }
        }
        self.gpu.bind_texture(None);

        for (program, layout, draws) in [
            (&self.programs.line, &LINE_LAYOUT, &frame.line_draws),
            (&self.programs.point, &POINT_LAYOUT, &frame.point_draws),
        ] {
            if draws.is_empty() {
                continue;
            }
            unsafe {
                let gl = self.gpu.backend().gl();
                gl.use_program(Some(program.program));
                gl.uniform_matrix_4_f32_slice(Some(&program.uniforms.transform), false, &matrix);
                gl.uniform_2_f32(Some(&program.uniforms.extra), viewport[0], viewport[1]);
                for range in draws {
                    self.draw(layout, range)?;
                }
            }
        }

        unsafe {
            let gl = self.gpu.backend().gl();
            gl.bind_vertex_array(None);
            gl.use_program(None);
            gl.disable(glow::BLEND);
        }
        self.gpu.maintain();
        Ok(())
    }

    /// Delete every GL object owned by the renderer.
    ///
    /// # Safety
    ///
    /// Requires the current GL context.
    pub unsafe fn destroy(mut self) {
        self.buffers.release(&mut self.gpu);
        for entry in self.textures.values() {
            if let Some(h) = entry.handle {
                self.gpu.release_texture(h);
            }
        }
        while self.gpu.maintain() > 0 {}
        unsafe { self.programs.destroy(self.gpu.backend().gl()) };
    }
}
