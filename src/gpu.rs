//! Lifecycle of the GPU objects behind batched geometry.
//!
//! GPU objects are owned by a [`ResourceRegistry`] and referred to through
//! generation-checked [`ResourceHandle`]s. A handle goes stale when its slot
//! is reclaimed or when the graphics context it was created in is replaced;
//! owners check [`GpuResources::buffer_valid`] before reuse and rebuild
//! instead of erroring. Released objects are destroyed by a bounded
//! [`sweep`](ResourceRegistry::sweep) run on the thread that owns the
//! context.

use std::collections::VecDeque;

use crate::error::TessError;
use crate::tessellator::Frame;

/// Identifies one incarnation of a graphics context. A backend bumps it
/// whenever the context is lost and recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContextGeneration(pub u32);

/// A reference to a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
    context: ContextGeneration,
}

impl ResourceHandle {
    /// The context the resource was created in.
    #[must_use]
    pub fn context(&self) -> ContextGeneration {
        self.context
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    context: ContextGeneration,
    refs: u32,
    resource: Option<T>,
}

/// Arena of GPU objects with explicit reference counts.
#[derive(Debug, Clone)]
pub struct ResourceRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    released: VecDeque<u32>,
}

impl<T> Default for ResourceRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            released: VecDeque::new(),
        }
    }
}

impl<T> ResourceRegistry<T> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, handle: ResourceHandle) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.refs > 0)
    }

    fn slot_mut(&mut self, handle: ResourceHandle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.refs > 0)
    }

    /// Take ownership of `resource` created in `context`, with one
    /// reference.
    pub fn insert(&mut self, context: ContextGeneration, resource: T) -> ResourceHandle {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.context = context;
                slot.refs = 1;
                slot.resource = Some(resource);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    context,
                    refs: 1,
                    resource: Some(resource),
                });
                u32::try_from(self.slots.len() - 1).unwrap_or(u32::MAX)
            }
        };
        ResourceHandle {
            index,
            generation: self.slots[index as usize].generation,
            context,
        }
    }

    /// The resource behind `handle`, if it has not been released.
    #[must_use]
    pub fn get(&self, handle: ResourceHandle) -> Option<&T> {
        self.slot(handle).and_then(|s| s.resource.as_ref())
    }

    /// Whether `handle` refers to a live resource of the `current` context.
    #[must_use]
    pub fn is_valid(&self, handle: ResourceHandle, current: ContextGeneration) -> bool {
        handle.context == current && self.get(handle).is_some()
    }

    /// Add a reference. Returns `false` for a stale handle.
    pub fn retain(&mut self, handle: ResourceHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a reference. The last one queues the resource for the next
    /// sweep. Returns `false` for a stale handle.
    pub fn release(&mut self, handle: ResourceHandle) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.refs -= 1;
        if slot.refs == 0 {
            self.released.push_back(handle.index);
        }
        true
    }

    /// Number of live resources.
    #[must_use]
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.refs > 0).count()
    }

    /// Number of released resources waiting for a sweep.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.released.len()
    }

    /// Reclaim at most `budget` released slots, oldest first.
    ///
    /// Resources of the `current` context are passed to `destroy`; those of
    /// a replaced context died with it and are forgotten. Returns the number
    /// of slots reclaimed.
    pub fn sweep(&mut self, current: ContextGeneration, budget: usize, mut destroy: impl FnMut(T)) -> usize {
        let mut reclaimed = 0;
        let mut forgotten = 0;
        while reclaimed < budget {
            let Some(index) = self.released.pop_front() else {
                break;
            };
            let slot = &mut self.slots[index as usize];
            if let Some(resource) = slot.resource.take() {
                if slot.context == current {
                    destroy(resource);
                } else {
                    forgotten += 1;
                }
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
            reclaimed += 1;
        }
        if reclaimed > 0 {
            log::debug!(
                "swept {reclaimed} GPU resources ({forgotten} from a lost context), {} pending",
                self.released.len()
            );
        }
        reclaimed
    }
}

/// What a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex data.
    Vertex,
    /// `u16` indices.
    Index,
}

/// The graphics API seen by this crate.
pub trait GpuBackend {
    /// Native buffer object.
    type Buffer;
    /// Native texture object.
    type Texture;

    /// The current context incarnation.
    fn generation(&self) -> ContextGeneration;

    /// Create an empty buffer.
    ///
    /// # Errors
    ///
    /// [`TessError::Gpu`] when the API refuses.
    fn create_buffer(&mut self, kind: BufferKind) -> Result<Self::Buffer, TessError>;

    /// Replace the contents of `buffer`.
    fn upload_buffer(&mut self, buffer: &Self::Buffer, kind: BufferKind, data: &[u8]);

    /// Delete `buffer`.
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Create an RGBA8 texture from tightly packed pixels.
    ///
    /// # Errors
    ///
    /// [`TessError::Gpu`] when the API refuses.
    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<Self::Texture, TessError>;

    /// Bind `texture` (or nothing) for the next draws.
    fn bind_texture(&mut self, texture: Option<&Self::Texture>);

    /// Delete `texture`.
    fn destroy_texture(&mut self, texture: Self::Texture);
}

/// Default number of slots a [`GpuResources::maintain`] call reclaims.
pub const DEFAULT_SWEEP_BUDGET: usize = 64;

/// A backend plus registries for the objects created through it.
pub struct GpuResources<B: GpuBackend> {
    backend: B,
    buffers: ResourceRegistry<B::Buffer>,
    textures: ResourceRegistry<B::Texture>,
    sweep_budget: usize,
}

impl<B: GpuBackend> std::fmt::Debug for GpuResources<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuResources")
            .field("generation", &self.backend.generation())
            .field("buffers", &self.buffers.live())
            .field("textures", &self.textures.live())
            .field("sweep_budget", &self.sweep_budget)
            .finish_non_exhaustive()
    }
}

impl<B: GpuBackend> GpuResources<B> {
    /// Wrap `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            buffers: ResourceRegistry::new(),
            textures: ResourceRegistry::new(),
            sweep_budget: DEFAULT_SWEEP_BUDGET,
        }
    }

    /// Set how many slots each registry reclaims per [`maintain`](Self::maintain).
    #[must_use]
    pub fn with_sweep_budget(mut self, budget: usize) -> Self {
        self.sweep_budget = budget;
        self
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Buffer registry.
    pub fn buffers(&self) -> &ResourceRegistry<B::Buffer> {
        &self.buffers
    }

    /// Texture registry.
    pub fn textures(&self) -> &ResourceRegistry<B::Texture> {
        &self.textures
    }

    /// Create a buffer.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports.
    pub fn create_buffer(&mut self, kind: BufferKind) -> Result<ResourceHandle, TessError> {
        let buffer = self.backend.create_buffer(kind)?;
        Ok(self.buffers.insert(self.backend.generation(), buffer))
    }

    /// Whether `handle` can be used with the current context.
    pub fn buffer_valid(&self, handle: ResourceHandle) -> bool {
        self.buffers.is_valid(handle, self.backend.generation())
    }

    /// Upload `data` into the buffer behind `handle`. Returns `false`, and
    /// does nothing, for a stale handle.
    pub fn upload(&mut self, handle: ResourceHandle, kind: BufferKind, data: &[u8]) -> bool {
        if !self.buffer_valid(handle) {
            return false;
        }
        match self.buffers.get(handle) {
            Some(buffer) => {
                self.backend.upload_buffer(buffer, kind, data);
                true
            }
            None => false,
        }
    }

    /// The native buffer behind `handle`, if valid.
    pub fn buffer(&self, handle: ResourceHandle) -> Option<&B::Buffer> {
        if self.buffer_valid(handle) {
            self.buffers.get(handle)
        } else {
            None
        }
    }

    /// Drop a buffer reference.
    pub fn release_buffer(&mut self, handle: ResourceHandle) {
        self.buffers.release(handle);
    }

    /// Create a texture from tightly packed RGBA8 pixels.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports.
    pub fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<ResourceHandle, TessError> {
        let texture = self.backend.create_texture(width, height, pixels)?;
        Ok(self.textures.insert(self.backend.generation(), texture))
    }

    /// Whether `handle` can be used with the current context.
    pub fn texture_valid(&self, handle: ResourceHandle) -> bool {
        self.textures.is_valid(handle, self.backend.generation())
    }

    /// Bind a texture, or unbind with `None`. Returns `false`, and unbinds,
    /// for a stale handle.
    pub fn bind_texture(&mut self, handle: Option<ResourceHandle>) -> bool {
        let Some(handle) = handle else {
            self.backend.bind_texture(None);
            return true;
        };
        if !self.texture_valid(handle) {
            self.backend.bind_texture(None);
            return false;
        }
        self.backend.bind_texture(self.textures.get(handle));
        true
    }

    /// Drop a texture reference.
    pub fn release_texture(&mut self, handle: ResourceHandle) {
        self.textures.release(handle);
    }

    /// Run one bounded sweep over both registries. Returns the number of
    /// slots reclaimed.
    pub fn maintain(&mut self) -> usize {
        let current = self.backend.generation();
        let backend = &mut self.backend;
        let buffers = self
            .buffers
            .sweep(current, self.sweep_budget, |b| backend.destroy_buffer(b));
        let textures = self
            .textures
            .sweep(current, self.sweep_budget, |t| backend.destroy_texture(t));
        buffers + textures
    }
}

/// One uploaded column of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Fill positions, `[f32; 3]`.
    FillPositions,
    /// Fill colors, `[u8; 4]`.
    FillColors,
    /// Fill normals, `[f32; 3]`.
    FillNormals,
    /// Fill texture coordinates, `[f32; 2]`.
    FillTexcoords,
    /// Fill indices, `u16`.
    FillIndices,
    /// Line positions, `[f32; 3]`.
    LinePositions,
    /// Line colors, `[u8; 4]`.
    LineColors,
    /// Line directions and offsets, `[f32; 4]`.
    LineDirections,
    /// Line indices, `u16`.
    LineIndices,
    /// Point centers, `[f32; 3]`.
    PointPositions,
    /// Point colors, `[u8; 4]`.
    PointColors,
    /// Point corner offsets, `[f32; 2]`.
    PointOffsets,
    /// Point indices, `u16`.
    PointIndices,
}

impl Column {
    /// Every column, in upload order.
    pub const ALL: [Column; 13] = [
        Column::FillPositions,
        Column::FillColors,
        Column::FillNormals,
        Column::FillTexcoords,
        Column::FillIndices,
        Column::LinePositions,
        Column::LineColors,
        Column::LineDirections,
        Column::LineIndices,
        Column::PointPositions,
        Column::PointColors,
        Column::PointOffsets,
        Column::PointIndices,
    ];

    /// The buffer kind the column needs.
    #[must_use]
    pub fn kind(self) -> BufferKind {
        match self {
            Column::FillIndices | Column::LineIndices | Column::PointIndices => BufferKind::Index,
            _ => BufferKind::Vertex,
        }
    }

    /// The column's bytes in `frame`.
    #[must_use]
    pub fn bytes<'a>(self, frame: &Frame<'a>) -> &'a [u8] {
        match self {
            Column::FillPositions => bytemuck::cast_slice(frame.fill.positions()),
            Column::FillColors => bytemuck::cast_slice(frame.fill.colors()),
            Column::FillNormals => bytemuck::cast_slice(frame.fill.normals()),
            Column::FillTexcoords => bytemuck::cast_slice(frame.fill.texcoords()),
            Column::FillIndices => bytemuck::cast_slice(frame.fill.indices()),
            Column::LinePositions => bytemuck::cast_slice(frame.line.positions()),
            Column::LineColors => bytemuck::cast_slice(frame.line.colors()),
            Column::LineDirections => bytemuck::cast_slice(frame.line.directions()),
            Column::LineIndices => bytemuck::cast_slice(frame.line.indices()),
            Column::PointPositions => bytemuck::cast_slice(frame.point.positions()),
            Column::PointColors => bytemuck::cast_slice(frame.point.colors()),
            Column::PointOffsets => bytemuck::cast_slice(frame.point.offsets()),
            Column::PointIndices => bytemuck::cast_slice(frame.point.indices()),
        }
    }
}

/// The buffers a [`Frame`] is uploaded into, rebuilt whenever they are
/// missing or belong to a lost context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchBuffers {
    handles: Vec<(Column, ResourceHandle)>,
}

impl BatchBuffers {
    /// No buffers yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of one column's buffer.
    #[must_use]
    pub fn handle(&self, column: Column) -> Option<ResourceHandle> {
        self.handles
            .iter()
            .find(|(c, _)| *c == column)
            .map(|&(_, h)| h)
    }

    /// Whether every column has a buffer usable with the current context.
    pub fn is_valid<B: GpuBackend>(&self, gpu: &GpuResources<B>) -> bool {
        self.handles.len() == Column::ALL.len() && self.handles.iter().all(|&(_, h)| gpu.buffer_valid(h))
    }

    /// Create the buffers if they are not valid. Returns whether they were
    /// (re)built.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports; buffers created before the failure are
    /// released.
    pub fn ensure<B: GpuBackend>(&mut self, gpu: &mut GpuResources<B>) -> Result<bool, TessError> {
        if self.is_valid(gpu) {
            return Ok(false);
        }
        if !self.handles.is_empty() {
            log::debug!("rebuilding batch buffers for context {:?}", gpu.backend().generation());
        }
        self.release(gpu);
        for column in Column::ALL {
            match gpu.create_buffer(column.kind()) {
                Ok(handle) => self.handles.push((column, handle)),
                Err(e) => {
                    self.release(gpu);
                    return Err(e);
                }
            }
        }
        Ok(true)
    }

    /// Upload every column of `frame`, rebuilding the buffers first if
    /// needed.
    ///
    /// # Errors
    ///
    /// See [`ensure`](Self::ensure).
    pub fn upload<B: GpuBackend>(&mut self, gpu: &mut GpuResources<B>, frame: &Frame<'_>) -> Result<(), TessError> {
        self.ensure(gpu)?;
        for &(column, handle) in &self.handles {
            gpu.upload(handle, column.kind(), column.bytes(frame));
        }
        Ok(())
    }

    /// Release every buffer. They are destroyed by a later sweep.
    pub fn release<B: GpuBackend>(&mut self, gpu: &mut GpuResources<B>) {
        for (_, handle) in self.handles.drain(..) {
            gpu.release_buffer(handle);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tessellator::Tessellator;
    use crate::types::{EndShape, ShapeKind};

    /// Records every call; buffers and textures are plain ids.
    #[derive(Debug, Default)]
    struct MockBackend {
        generation: u32,
        next: u32,
        uploads: Vec<(u32, BufferKind, usize)>,
        destroyed: Vec<u32>,
        bound: Option<u32>,
        fail: bool,
    }

    impl GpuBackend for MockBackend {
        type Buffer = u32;
        type Texture = u32;

        fn generation(&self) -> ContextGeneration {
            ContextGeneration(self.generation)
        }

        fn create_buffer(&mut self, _kind: BufferKind) -> Result<u32, TessError> {
            if self.fail {
                return Err(TessError::Gpu("out of memory".into()));
            }
            self.next += 1;
            Ok(self.next)
        }

        fn upload_buffer(&mut self, buffer: &u32, kind: BufferKind, data: &[u8]) {
            self.uploads.push((*buffer, kind, data.len()));
        }

        fn destroy_buffer(&mut self, buffer: u32) {
            self.destroyed.push(buffer);
        }

        fn create_texture(&mut self, _width: u32, _height: u32, _pixels: &[u8]) -> Result<u32, TessError> {
            self.next += 1;
            Ok(self.next)
        }

        fn bind_texture(&mut self, texture: Option<&u32>) {
            self.bound = texture.copied();
        }

        fn destroy_texture(&mut self, texture: u32) {
            self.destroyed.push(texture);
        }
    }

    #[test]
    fn released_handles_go_stale() {
        let mut registry = ResourceRegistry::new();
        let gen = ContextGeneration(0);
        let a = registry.insert(gen, "a");
        assert!(registry.retain(a));
        assert!(registry.release(a));
        assert!(registry.is_valid(a, gen));
        assert!(registry.release(a));
        assert_eq!(registry.get(a), None);
        assert!(!registry.release(a));
        let mut destroyed = Vec::new();
        assert_eq!(registry.sweep(gen, 8, |r| destroyed.push(r)), 1);
        assert_eq!(destroyed, ["a"]);
        let b = registry.insert(gen, "b");
        assert_eq!(b.index, a.index);
        assert_eq!(registry.get(a), None);
        assert_eq!(registry.get(b), Some(&"b"));
    }

    #[test]
    fn sweep_is_bounded() {
        let mut registry = ResourceRegistry::new();
        let gen = ContextGeneration(0);
        let handles: Vec<_> = (0..5).map(|i| registry.insert(gen, i)).collect();
        for h in handles {
            registry.release(h);
        }
        let mut destroyed = Vec::new();
        assert_eq!(registry.sweep(gen, 2, |r| destroyed.push(r)), 2);
        assert_eq!(registry.pending(), 3);
        assert_eq!(destroyed, [0, 1]);
    }

    #[test]
    fn lost_context_resources_are_forgotten() {
        let mut registry = ResourceRegistry::new();
        let h = registry.insert(ContextGeneration(0), 7);
        assert!(!registry.is_valid(h, ContextGeneration(1)));
        registry.release(h);
        let mut destroyed = Vec::new();
        assert_eq!(registry.sweep(ContextGeneration(1), 8, |r| destroyed.push(r)), 1);
        assert!(destroyed.is_empty());
    }

    #[test]
    fn batch_buffers_rebuild_after_context_loss() {
        let mut tess = Tessellator::default();
        tess.begin_shape(ShapeKind::Triangles).unwrap();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            tess.vertex(p).unwrap();
        }
        tess.end_shape(EndShape::open()).unwrap();
        let frame = tess.flush();

        let mut gpu = GpuResources::new(MockBackend::default());
        let mut buffers = BatchBuffers::new();
        assert!(buffers.ensure(&mut gpu).unwrap());
        assert!(!buffers.ensure(&mut gpu).unwrap());
        buffers.upload(&mut gpu, &frame).unwrap();
        let positions = buffers.handle(Column::FillPositions).unwrap();
        let id = *gpu.buffer(positions).unwrap();
        assert!(gpu.backend().uploads.contains(&(id, BufferKind::Vertex, 36)));

        gpu.backend_mut().generation = 1;
        assert!(!buffers.is_valid(&gpu));
        assert!(buffers.ensure(&mut gpu).unwrap());
        assert!(buffers.is_valid(&gpu));
        assert_eq!(gpu.buffers().pending(), Column::ALL.len());
        gpu.maintain();
        assert!(gpu.backend().destroyed.is_empty());
    }

    #[test]
    fn failed_creation_releases_partial_buffers() {
        let mut gpu = GpuResources::new(MockBackend {
            fail: true,
            ..MockBackend::default()
        });
        let mut buffers = BatchBuffers::new();
        assert!(matches!(buffers.ensure(&mut gpu), Err(TessError::Gpu(_))));
        assert_eq!(buffers.handle(Column::FillIndices), None);
    }

    #[test]
    fn stale_textures_unbind() {
        let mut gpu = GpuResources::new(MockBackend::default());
        let t = gpu.create_texture(1, 1, &[255; 4]).unwrap();
        assert!(gpu.bind_texture(Some(t)));
        assert!(gpu.backend().bound.is_some());
        gpu.release_texture(t);
        assert!(!gpu.bind_texture(Some(t)));
        assert_eq!(gpu.backend().bound, None);
        assert_eq!(gpu.maintain(), 1);
        assert_eq!(gpu.backend().destroyed.len(), 1);
    }
}
