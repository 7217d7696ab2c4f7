//! Batched output geometry and the index cache that keeps it index-safe.
//!
//! Every store (fill, line, point) appends vertices to flat column arrays
//! and `u16` indices to one index array. The [`IndexCache`] splits that
//! output into [`IndexBlock`]s whose indices are relative to the block's
//! first vertex and never reach the configured index width, so each block
//! can be drawn with one `glDrawElements(GL_UNSIGNED_SHORT)` call.

use std::collections::HashMap;
use std::ops::Range;

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::attribs::{AttribData, AttribKind, AttribRegistry};
use crate::error::TessError;
use crate::raw::RawGeometry;
use crate::texture::TextureBatcher;
use crate::types::{Rgba, TextureId};

/// One index-safe slice of a geometry store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexBlock {
    /// First index of the block in the index array.
    pub index_offset: usize,
    /// Number of indices.
    pub index_count: usize,
    /// First vertex the block's indices are relative to.
    pub vertex_offset: usize,
    /// Number of vertices the block may reference.
    pub vertex_count: usize,
}

impl IndexBlock {
    /// Index range in the index array.
    #[must_use]
    pub fn index_range(&self) -> Range<usize> {
        self.index_offset..self.index_offset + self.index_count
    }

    /// Vertex range in the column arrays.
    #[must_use]
    pub fn vertex_range(&self) -> Range<usize> {
        self.vertex_offset..self.vertex_offset + self.vertex_count
    }
}

/// Ordered list of [`IndexBlock`]s. Only the last block ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCache {
    blocks: Vec<IndexBlock>,
}

impl IndexCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every block.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether there is no block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All blocks in order.
    #[must_use]
    pub fn blocks(&self) -> &[IndexBlock] {
        &self.blocks
    }

    /// Block `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&IndexBlock> {
        self.blocks.get(i)
    }

    /// Open an empty block after everything stored so far; returns its
    /// position.
    pub fn add_new(&mut self) -> usize {
        let index_offset = self
            .blocks
            .last()
            .map_or(0, |b| b.index_offset + b.index_count);
        let vertex_offset = self
            .blocks
            .iter()
            .map(|b| b.vertex_offset + b.vertex_count)
            .max()
            .unwrap_or(0);
        self.blocks.push(IndexBlock {
            index_offset,
            index_count: 0,
            vertex_offset,
            vertex_count: 0,
        });
        self.blocks.len() - 1
    }

    /// The block that can take `vertices` more vertices under `max`,
    /// opening a new one when the last is too full.
    ///
    /// # Errors
    ///
    /// [`TessError::CapacityExceeded`] when `vertices` exceeds `max`.
    pub fn reserve(&mut self, vertices: usize, max: usize) -> Result<usize, TessError> {
        if vertices > max {
            return Err(TessError::CapacityExceeded {
                needed: vertices,
                max,
            });
        }
        match self.blocks.last() {
            Some(last) if last.vertex_count + vertices <= max => Ok(self.blocks.len() - 1),
            _ => Ok(self.add_new()),
        }
    }

    /// Grow the last block.
    pub(crate) fn grow_last(&mut self, indices: usize, vertices: usize) {
        if let Some(last) = self.blocks.last_mut() {
            last.index_count += indices;
            last.vertex_count += vertices;
        }
    }

    /// Block containing absolute index `index`.
    #[must_use]
    pub fn block_of_index(&self, index: usize) -> Option<usize> {
        let i = self
            .blocks
            .partition_point(|b| b.index_offset + b.index_count <= index);
        (i < self.blocks.len() && self.blocks[i].index_offset <= index).then_some(i)
    }

    /// Total number of indices over all blocks.
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.index_offset + b.index_count)
    }

    pub(crate) fn from_blocks(blocks: Vec<IndexBlock>) -> Self {
        Self { blocks }
    }
}

/// Model and normal matrices applied on the CPU while batching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexTransform {
    model: Mat4,
    normal: Mat3,
}

impl VertexTransform {
    /// Transform by `model`; normals use its inverse transpose.
    #[must_use]
    pub fn new(model: Mat4) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self { model, normal }
    }

    /// Transform a position.
    #[must_use]
    pub fn point(&self, p: [f32; 3]) -> [f32; 3] {
        self.model.transform_point3(Vec3::from(p)).to_array()
    }

    /// Transform and renormalise a normal.
    #[must_use]
    pub fn normal(&self, n: [f32; 3]) -> [f32; 3] {
        (self.normal * Vec3::from(n)).normalize_or_zero().to_array()
    }

    /// Transform a generic attribute according to its kind.
    #[must_use]
    pub fn attrib(&self, kind: AttribKind, arity: usize, v: [f32; 4]) -> [f32; 4] {
        match (kind, arity) {
            (AttribKind::Position, 2 | 3) => {
                let p = self.point([v[0], v[1], v[2]]);
                [p[0], p[1], p[2], v[3]]
            }
            (AttribKind::Position, 4) => (self.model * Vec4::from(v)).to_array(),
            (AttribKind::Normal, 3) => {
                let n = self.normal([v[0], v[1], v[2]]);
                [n[0], n[1], n[2], v[3]]
            }
            _ => v,
        }
    }
}

/// Resolve a pending block slot while partitioning.
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Source vertex copied as part of the contiguous range.
    Direct(u32),
    /// Position in the block's duplicate list.
    Dup(usize),
}

/// Triangle geometry: the output of polygon fills, shape primitives and
/// outline strokes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillGeometry {
    pub(crate) positions: Vec<[f32; 3]>,
    pub(crate) colors: Vec<Rgba>,
    pub(crate) normals: Vec<[f32; 3]>,
    pub(crate) texcoords: Vec<[f32; 2]>,
    pub(crate) ambient: Vec<Rgba>,
    pub(crate) specular: Vec<Rgba>,
    pub(crate) emissive: Vec<Rgba>,
    pub(crate) shininess: Vec<f32>,
    pub(crate) attribs: Vec<AttribData>,
    pub(crate) indices: Vec<u16>,
    pub(crate) cache: IndexCache,
}

impl FillGeometry {
    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    /// Fill colors.
    #[must_use]
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Normals.
    #[must_use]
    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    /// Texture coordinates.
    #[must_use]
    pub fn texcoords(&self) -> &[[f32; 2]] {
        &self.texcoords
    }

    /// Ambient material colors.
    #[must_use]
    pub fn ambient(&self) -> &[Rgba] {
        &self.ambient
    }

    /// Specular material colors.
    #[must_use]
    pub fn specular(&self) -> &[Rgba] {
        &self.specular
    }

    /// Emissive material colors.
    #[must_use]
    pub fn emissive(&self) -> &[Rgba] {
        &self.emissive
    }

    /// Specular exponents.
    #[must_use]
    pub fn shininess(&self) -> &[f32] {
        &self.shininess
    }

    /// Generic attribute column `index`.
    #[must_use]
    pub fn attrib(&self, index: usize) -> Option<&AttribData> {
        self.attribs.get(index)
    }

    /// Block-relative indices.
    #[must_use]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// The index blocks.
    #[must_use]
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Remove all geometry.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.normals.clear();
        self.texcoords.clear();
        self.ambient.clear();
        self.specular.clear();
        self.emissive.clear();
        self.shininess.clear();
        for column in &mut self.attribs {
            column.clear();
        }
        self.indices.clear();
        self.cache.clear();
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Absolute vertex indices of every triangle, in draw order.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.cache.blocks().iter().flat_map(move |block| {
            self.indices[block.index_range()]
                .chunks_exact(3)
                .map(move |t| [t[0], t[1], t[2]].map(|i| block.vertex_offset + usize::from(i)))
        })
    }

    fn sync_attribs(&mut self, registry: &AttribRegistry) {
        let len = self.vertex_count();
        for format in registry.formats().skip(self.attribs.len()) {
            let mut column = AttribData::new(format.ty);
            for _ in 0..len {
                column.push_packed(&[], format.width());
            }
            self.attribs.push(column);
        }
    }

    fn push_raw(
        &mut self,
        src: &RawGeometry,
        i: usize,
        registry: &AttribRegistry,
        transform: Option<&VertexTransform>,
    ) {
        let v = src.vertex(i);
        let (position, normal) = match transform {
            Some(t) => (t.point(v.position), t.normal(v.normal)),
            None => (v.position, v.normal),
        };
        self.positions.push(position);
        self.colors.push(v.fill);
        self.normals.push(normal);
        self.texcoords.push(v.texcoord);
        self.ambient.push(v.material.ambient);
        self.specular.push(v.material.specular);
        self.emissive.push(v.material.emissive);
        self.shininess.push(v.material.shininess);
        for (k, (column, format)) in self.attribs.iter_mut().zip(registry.formats()).enumerate() {
            let arity = format.width();
            match (src.attrib(k), transform) {
                (Some(from), None) => column.push_from(from, i, arity),
                (Some(from), Some(t)) => {
                    let value = t.attrib(format.kind, arity, from.get(i, arity));
                    column.push_packed(&value.map(f64::from), arity);
                }
                (None, _) => column.push_packed(&[], arity),
            }
        }
    }

    /// Append the triangles `raw_indices` (triples of vertex indices into
    /// `src`), splitting into index blocks of at most `max` vertices.
    ///
    /// Source vertices are copied in contiguous runs; a triangle that refers
    /// to a vertex already left behind by the current block gets a duplicate
    /// of it at the block's tail. Returns the absolute index range written.
    ///
    /// # Errors
    ///
    /// [`TessError::CapacityExceeded`] when `max < 3`.
    pub fn append_triangles(
        &mut self,
        src: &RawGeometry,
        raw_indices: &[u32],
        max: usize,
        registry: &AttribRegistry,
        transform: Option<&VertexTransform>,
    ) -> Result<Range<usize>, TessError> {
        let first = self.indices.len();
        if raw_indices.len() < 3 {
            return Ok(first..first);
        }
        if max < 3 {
            return Err(TessError::CapacityExceeded { needed: 3, max });
        }
        self.sync_attribs(registry);

        let block_index = self.cache.reserve(3, max)?;
        let mut base = self.cache.blocks[block_index].vertex_count;
        let mut start = raw_indices.iter().copied().min().unwrap_or(0);
        let mut end = start;
        let mut dups: Vec<u32> = Vec::new();
        let mut dup_pos: HashMap<u32, usize> = HashMap::new();
        let mut pending: Vec<Slot> = Vec::new();
        let mut splits = 0usize;

        for tri in raw_indices.chunks_exact(3) {
            let needed = |start: u32, end: u32, dup_pos: &HashMap<u32, usize>| {
                let new_end = tri.iter().fold(end, |e, &v| if v >= start { e.max(v + 1) } else { e });
                let mut fresh: Vec<u32> = tri
                    .iter()
                    .copied()
                    .filter(|v| *v < start && !dup_pos.contains_key(v))
                    .collect();
                fresh.sort_unstable();
                fresh.dedup();
                (new_end - start) as usize + fresh.len()
            };
            if base + needed(start, end, &dup_pos) + dups.len() > max {
                if base > 0 || end > start || !dups.is_empty() {
                    self.commit_block(src, start..end, &dups, &pending, base, registry, transform);
                    self.cache.add_new();
                    splits += 1;
                    base = 0;
                    start = end;
                    dups.clear();
                    dup_pos.clear();
                    pending.clear();
                }
                if needed(start, end, &dup_pos) > max {
                    let next = tri.iter().copied().max().unwrap_or(end) + 1;
                    start = next;
                    end = next;
                }
            }
            for &v in tri {
                let slot = if v >= start {
                    end = end.max(v + 1);
                    Slot::Direct(v)
                } else {
                    let p = *dup_pos.entry(v).or_insert_with(|| {
                        dups.push(v);
                        dups.len() - 1
                    });
                    Slot::Dup(p)
                };
                pending.push(slot);
            }
        }
        self.commit_block(src, start..end, &dups, &pending, base, registry, transform);
        if splits > 0 {
            log::debug!(
                "{} triangles split into {} extra index blocks (limit {max})",
                raw_indices.len() / 3,
                splits
            );
        }
        Ok(first..self.indices.len())
    }

    #[expect(clippy::too_many_arguments)]
    fn commit_block(
        &mut self,
        src: &RawGeometry,
        direct: Range<u32>,
        dups: &[u32],
        pending: &[Slot],
        base: usize,
        registry: &AttribRegistry,
        transform: Option<&VertexTransform>,
    ) {
        let direct_len = (direct.end - direct.start) as usize;
        for v in direct.clone().chain(dups.iter().copied()) {
            self.push_raw(src, v as usize, registry, transform);
        }
        for slot in pending {
            let local = match *slot {
                Slot::Direct(v) => base + (v - direct.start) as usize,
                Slot::Dup(p) => base + direct_len + p,
            };
            self.indices.push(local_index(local));
        }
        self.cache.grow_last(pending.len(), direct_len + dups.len());
    }

    /// Overwrite the normals of the triangles in `indices` (an absolute
    /// index range) with their face normals.
    pub fn calc_normals(&mut self, indices: Range<usize>) {
        let mut at = indices.start - indices.start % 3;
        while at + 3 <= indices.end {
            let Some(block) = self.cache.block_of_index(at).map(|b| self.cache.blocks[b]) else {
                break;
            };
            let tri = [0, 1, 2].map(|k| block.vertex_offset + usize::from(self.indices[at + k]));
            let [a, b, c] = tri.map(|v| Vec3::from(self.positions[v]));
            let n = (b - a).cross(c - a).normalize_or_zero();
            if n != Vec3::ZERO {
                for v in tri {
                    self.normals[v] = n.to_array();
                }
            }
            at += 3;
        }
    }

    /// Rebuild the index blocks so triangles are drawn in `order` (a
    /// permutation of triangle numbers as yielded by
    /// [`triangles`](Self::triangles)) and re-tag `textures` to match.
    ///
    /// Vertices are not moved: each run of consecutive triangles from one
    /// source block becomes a new block over that block's vertex range.
    pub fn reorder_triangles(&mut self, order: &[usize], textures: &mut TextureBatcher) {
        let mut owner: Vec<(usize, usize)> = Vec::with_capacity(self.triangle_count());
        for (b, block) in self.cache.blocks().iter().enumerate() {
            for local in 0..block.index_count / 3 {
                owner.push((b, block.index_offset + local * 3));
            }
        }
        let tri_textures: Vec<Option<TextureId>> = owner
            .iter()
            .map(|&(_, at)| textures.texture_at(&self.cache, at).flatten())
            .collect();

        let mut indices = Vec::with_capacity(self.indices.len());
        let mut blocks: Vec<IndexBlock> = Vec::new();
        let mut current_source = usize::MAX;
        for &t in order {
            let (b, at) = owner[t];
            if b != current_source || blocks.is_empty() {
                let source = self.cache.blocks[b];
                blocks.push(IndexBlock {
                    index_offset: indices.len(),
                    index_count: 0,
                    vertex_offset: source.vertex_offset,
                    vertex_count: source.vertex_count,
                });
                current_source = b;
            }
            indices.extend_from_slice(&self.indices[at..at + 3]);
            if let Some(last) = blocks.last_mut() {
                last.index_count += 3;
            }
        }
        self.indices = indices;
        self.cache = IndexCache::from_blocks(blocks);

        let had_textures = !textures.is_empty();
        textures.clear();
        if had_textures {
            for (k, &t) in order.iter().enumerate() {
                textures.tag(tri_textures[t], &self.cache, k * 3..k * 3 + 3);
            }
        }
    }
}

/// A line segment's four vertices, as placed by [`LineGeometry::add_segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRef {
    /// Block holding the segment.
    pub block: usize,
    /// Block-relative index of the segment's first vertex.
    pub first: usize,
}

/// Endpoint of a stroke segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePoint {
    /// Position.
    pub position: [f32; 3],
    /// Stroke color.
    pub color: Rgba,
}

/// Stroke quads expanded on the GPU.
///
/// Each vertex sits on a segment endpoint; `directions` carries the other
/// endpoint and the signed half width so the vertex stage can extrude in
/// screen space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineGeometry {
    pub(crate) positions: Vec<[f32; 3]>,
    pub(crate) colors: Vec<Rgba>,
    pub(crate) directions: Vec<[f32; 4]>,
    pub(crate) indices: Vec<u16>,
    pub(crate) cache: IndexCache,
}

impl LineGeometry {
    /// Vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    /// Stroke colors.
    #[must_use]
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Other endpoint (xyz) and signed half width (w) per vertex.
    #[must_use]
    pub fn directions(&self) -> &[[f32; 4]] {
        &self.directions
    }

    /// Block-relative indices.
    #[must_use]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// The index blocks.
    #[must_use]
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Remove all geometry.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.directions.clear();
        self.indices.clear();
        self.cache.clear();
    }

    fn push(&mut self, position: [f32; 3], color: Rgba, other: [f32; 3], offset: f32) {
        self.positions.push(position);
        self.colors.push(color);
        self.directions.push([other[0], other[1], other[2], offset]);
    }

    /// Append the quad for segment `a`→`b` of width `weight`.
    ///
    /// # Errors
    ///
    /// [`TessError::CapacityExceeded`] when `max < 4`.
    pub fn add_segment(
        &mut self,
        a: LinePoint,
        b: LinePoint,
        weight: f32,
        max: usize,
        transform: Option<&VertexTransform>,
    ) -> Result<SegmentRef, TessError> {
        let block = self.cache.reserve(4, max)?;
        let first = self.cache.blocks[block].vertex_count;
        let (pa, pb) = match transform {
            Some(t) => (t.point(a.position), t.point(b.position)),
            None => (a.position, b.position),
        };
        let half = weight / 2.0;
        self.push(pa, a.color, pb, half);
        self.push(pa, a.color, pb, -half);
        self.push(pb, b.color, pa, -half);
        self.push(pb, b.color, pa, half);
        for i in [0, 1, 2, 2, 1, 3] {
            self.indices.push(local_index(first + i));
        }
        self.cache.grow_last(6, 4);
        Ok(SegmentRef { block, first })
    }

    /// Fill the joint between `prev`'s end and `next`'s start with two
    /// triangles over their existing vertices. Returns `false` (and adds
    /// nothing) when the segments live in different blocks.
    pub fn add_bevel(&mut self, prev: SegmentRef, next: SegmentRef) -> bool {
        if prev.block != next.block || prev.block + 1 != self.cache.len() {
            return false;
        }
        let (p2, p3) = (prev.first + 2, prev.first + 3);
        let (q0, q1) = (next.first, next.first + 1);
        for i in [p2, p3, q0, p3, q1, q0] {
            self.indices.push(local_index(i));
        }
        self.cache.grow_last(6, 0);
        true
    }
}

/// Point sprites expanded on the GPU.
///
/// Every vertex of a point sits at its center; `offsets` carries the corner
/// displacement applied in screen space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointGeometry {
    pub(crate) positions: Vec<[f32; 3]>,
    pub(crate) colors: Vec<Rgba>,
    pub(crate) offsets: Vec<[f32; 2]>,
    pub(crate) indices: Vec<u16>,
    pub(crate) cache: IndexCache,
}

impl PointGeometry {
    /// Vertex positions (point centers).
    #[must_use]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    /// Point colors.
    #[must_use]
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Screen-space corner offsets.
    #[must_use]
    pub fn offsets(&self) -> &[[f32; 2]] {
        &self.offsets
    }

    /// Block-relative indices.
    #[must_use]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// The index blocks.
    #[must_use]
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Remove all geometry.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.offsets.clear();
        self.indices.clear();
        self.cache.clear();
    }

    /// Append a round point as a fan of `segments` triangles.
    ///
    /// # Errors
    ///
    /// [`TessError::CapacityExceeded`] when `segments + 1 > max`.
    #[expect(clippy::cast_precision_loss)]
    pub fn add_round(
        &mut self,
        center: [f32; 3],
        color: Rgba,
        weight: f32,
        segments: usize,
        max: usize,
    ) -> Result<(), TessError> {
        let segments = segments.max(3);
        self.cache.reserve(segments + 1, max)?;
        let first = self.last_vertex_count();
        let radius = weight / 2.0;
        self.positions.push(center);
        self.colors.push(color);
        self.offsets.push([0.0, 0.0]);
        let step = std::f32::consts::TAU / segments as f32;
        for k in 0..segments {
            let (sin, cos) = (step * k as f32).sin_cos();
            self.positions.push(center);
            self.colors.push(color);
            self.offsets.push([radius * cos, radius * sin]);
        }
        for k in 0..segments {
            let next = (k + 1) % segments;
            for i in [0, 1 + k, 1 + next] {
                self.indices.push(local_index(first + i));
            }
        }
        self.cache.grow_last(segments * 3, segments + 1);
        Ok(())
    }

    /// Append a square point: center plus four corners.
    ///
    /// # Errors
    ///
    /// [`TessError::CapacityExceeded`] when `max < 5`.
    pub fn add_square(
        &mut self,
        center: [f32; 3],
        color: Rgba,
        weight: f32,
        max: usize,
    ) -> Result<(), TessError> {
        self.cache.reserve(5, max)?;
        let first = self.last_vertex_count();
        let half = weight / 2.0;
        self.positions.push(center);
        self.colors.push(color);
        self.offsets.push([0.0, 0.0]);
        for (sx, sy) in [(-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0), (1.0, 1.0)] {
            self.positions.push(center);
            self.colors.push(color);
            self.offsets.push([sx * half, sy * half]);
        }
        for i in [0, 1, 2, 0, 2, 3, 0, 3, 4, 0, 4, 1] {
            self.indices.push(local_index(first + i));
        }
        self.cache.grow_last(12, 5);
        Ok(())
    }

    fn last_vertex_count(&self) -> usize {
        self.cache.blocks().last().map_or(0, |b| b.vertex_count)
    }
}

/// Everything one shape, or one frame of shapes, tessellates into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessGeometry {
    /// Triangles: fills and outline strokes.
    pub fill: FillGeometry,
    /// Quad-expanded strokes.
    pub line: LineGeometry,
    /// Points.
    pub point: PointGeometry,
    /// Texture tags over `fill`.
    pub textures: TextureBatcher,
}

impl TessGeometry {
    /// Remove all geometry and texture tags.
    pub fn clear(&mut self) {
        self.fill.clear();
        self.line.clear();
        self.point.clear();
        self.textures.clear();
    }

    /// Whether nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fill.indices.is_empty() && self.line.indices.is_empty() && self.point.indices.is_empty()
    }
}

/// Narrow a block-relative index. Blocks never exceed the `u16` range.
#[expect(clippy::cast_possible_truncation)]
fn local_index(i: usize) -> u16 {
    debug_assert!(i < crate::config::MAX_INDEX_WIDTH);
    i as u16
}
