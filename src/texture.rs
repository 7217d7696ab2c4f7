//! Texture batching over a geometry store's index blocks.

use std::ops::Range;

use crate::batch::IndexCache;
use crate::types::TextureId;

/// A run of indices drawn with one bound texture (or none).
///
/// Positions are `(block, index within block)`; `last_index` is inclusive.
/// A batch may start and end anywhere inside a block and may span several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBatch {
    /// The bound texture, `None` for untextured geometry.
    pub texture: Option<TextureId>,
    /// Block of the first index.
    pub first_block: usize,
    /// First index, relative to `first_block`.
    pub first_index: usize,
    /// Block of the last index.
    pub last_block: usize,
    /// Last index (inclusive), relative to `last_block`.
    pub last_index: usize,
}

/// One draw call: a contiguous index range inside a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    /// The texture to bind.
    pub texture: Option<TextureId>,
    /// Block the range belongs to.
    pub block: usize,
    /// First index in the index array.
    pub index_offset: usize,
    /// Number of indices.
    pub index_count: usize,
    /// Vertex the indices are relative to.
    pub vertex_offset: usize,
}

/// Ordered, disjoint [`TextureBatch`]es.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureBatcher {
    batches: Vec<TextureBatch>,
}

impl TextureBatcher {
    /// No batches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The batches in draw order.
    #[must_use]
    pub fn batches(&self) -> &[TextureBatch] {
        &self.batches
    }

    /// Number of batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether nothing has been tagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Forget every batch.
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Tag the absolute index range `indices` of `cache` with `texture`.
    ///
    /// Extends the previous batch when the texture matches and the range
    /// continues it; opens a new batch otherwise.
    pub fn tag(&mut self, texture: Option<TextureId>, cache: &IndexCache, indices: Range<usize>) {
        if indices.is_empty() {
            return;
        }
        let (Some(first_block), Some(last_block)) = (
            cache.block_of_index(indices.start),
            cache.block_of_index(indices.end - 1),
        ) else {
            log::warn!("texture tag {indices:?} is outside the index cache");
            return;
        };
        let first_index = indices.start - cache.blocks()[first_block].index_offset;
        let last_index = indices.end - 1 - cache.blocks()[last_block].index_offset;
        if let Some(prev) = self.batches.last_mut() {
            let prev_end = cache.blocks()[prev.last_block].index_offset + prev.last_index + 1;
            if prev.texture == texture && prev_end == indices.start {
                prev.last_block = last_block;
                prev.last_index = last_index;
                return;
            }
        }
        self.batches.push(TextureBatch {
            texture,
            first_block,
            first_index,
            last_block,
            last_index,
        });
    }

    /// Texture of the batch covering absolute index `index`, or `None` when
    /// no batch covers it.
    #[must_use]
    pub fn texture_at(&self, cache: &IndexCache, index: usize) -> Option<Option<TextureId>> {
        let blocks = cache.blocks();
        self.batches
            .iter()
            .find(|b| {
                let first = blocks[b.first_block].index_offset + b.first_index;
                let last = blocks[b.last_block].index_offset + b.last_index;
                (first..=last).contains(&index)
            })
            .map(|b| b.texture)
    }

    /// Split every batch at block boundaries.
    #[must_use]
    pub fn draw_ranges(&self, cache: &IndexCache) -> Vec<DrawRange> {
        let mut ranges = Vec::new();
        for batch in &self.batches {
            for block_index in batch.first_block..=batch.last_block {
                let block = cache.blocks()[block_index];
                let start = if block_index == batch.first_block {
                    batch.first_index
                } else {
                    0
                };
                let end = if block_index == batch.last_block {
                    batch.last_index + 1
                } else {
                    block.index_count
                };
                if end > start {
                    ranges.push(DrawRange {
                        texture: batch.texture,
                        block: block_index,
                        index_offset: block.index_offset + start,
                        index_count: end - start,
                        vertex_offset: block.vertex_offset,
                    });
                }
            }
        }
        ranges
    }
}

/// One untextured draw per block; used for line and point geometry.
#[must_use]
pub fn block_ranges(cache: &IndexCache) -> Vec<DrawRange> {
    cache
        .blocks()
        .iter()
        .enumerate()
        .filter(|(_, b)| b.index_count > 0)
        .map(|(block, b)| DrawRange {
            texture: None,
            block,
            index_offset: b.index_offset,
            index_count: b.index_count,
            vertex_offset: b.vertex_offset,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::batch::IndexBlock;

    fn cache(counts: &[usize]) -> IndexCache {
        let mut offset = 0;
        let blocks = counts
            .iter()
            .map(|&index_count| {
                let block = IndexBlock {
                    index_offset: offset,
                    index_count,
                    vertex_offset: offset,
                    vertex_count: index_count,
                };
                offset += index_count;
                block
            })
            .collect();
        IndexCache::from_blocks(blocks)
    }

    #[test]
    fn alternating_textures_make_four_batches() {
        let cache = cache(&[18]);
        let (t1, t2) = (Some(TextureId(1)), Some(TextureId(2)));
        let mut batcher = TextureBatcher::new();
        for (k, texture) in [t1, t1, t2, t2, None, t1].into_iter().enumerate() {
            batcher.tag(texture, &cache, k * 3..k * 3 + 3);
        }
        let textures: Vec<_> = batcher.batches().iter().map(|b| b.texture).collect();
        assert_eq!(textures, [t1, t2, None, t1]);
        let ranges = batcher.draw_ranges(&cache);
        let spans: Vec<_> = ranges.iter().map(|r| (r.index_offset, r.index_count)).collect();
        assert_eq!(spans, [(0, 6), (6, 6), (12, 3), (15, 3)]);
    }

    #[test]
    fn batch_spanning_blocks_splits_into_ranges() {
        let cache = cache(&[6, 6, 6]);
        let mut batcher = TextureBatcher::new();
        batcher.tag(Some(TextureId(7)), &cache, 3..15);
        assert_eq!(
            batcher.batches()[0],
            TextureBatch {
                texture: Some(TextureId(7)),
                first_block: 0,
                first_index: 3,
                last_block: 2,
                last_index: 2,
            }
        );
        let ranges = batcher.draw_ranges(&cache);
        let spans: Vec<_> = ranges.iter().map(|r| (r.block, r.index_offset, r.index_count)).collect();
        assert_eq!(spans, [(0, 3, 3), (1, 6, 6), (2, 12, 3)]);
    }

    #[test]
    fn texture_at_finds_the_covering_batch() {
        let cache = cache(&[9]);
        let mut batcher = TextureBatcher::new();
        batcher.tag(None, &cache, 0..3);
        batcher.tag(Some(TextureId(3)), &cache, 3..6);
        assert_eq!(batcher.texture_at(&cache, 4), Some(Some(TextureId(3))));
        assert_eq!(batcher.texture_at(&cache, 1), Some(None));
        assert_eq!(batcher.texture_at(&cache, 7), None);
    }
}
