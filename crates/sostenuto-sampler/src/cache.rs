//! Time-stretch / repitch cache chunk bookkeeping.
//!
//! A cache holds a rendered copy of a sample at one phase increment and
//! time-stretch ratio. It is written front to back; `write_byte_pos` marks how
//! much of it is valid. Losing any chunk invalidates everything after it.

use crate::chunk::{ChunkId, ChunkOwner, ChunkTable, OwnerKey};
use crate::pool::{ChunkPool, ChunkReason};
use crate::sample::Sample;
use sostenuto_core::{ChunkLayout, UNITY_PHASE_INCREMENT};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct SampleCache {
    sample: Arc<Sample>,
    layout: ChunkLayout,
    phase_increment: u32,
    time_stretch_ratio: u32,
    length_in_frames: u64,
    chunks: ChunkTable,
    write_byte_pos: AtomicU64,
}

impl SampleCache {
    /// Cache for `sample` rendered at `phase_increment` with `time_stretch_ratio`,
    /// both 24-bit fixed point.
    pub fn new(sample: &Arc<Sample>, phase_increment: u32, time_stretch_ratio: u32) -> Arc<Self> {
        let layout = sample.layout();
        let length_in_frames = (sample.length_in_samples() as u128
            * time_stretch_ratio as u128
            / phase_increment.max(1) as u128) as u64;
        let length_in_bytes = length_in_frames * sample.info().bytes_per_frame();

        Arc::new(Self {
            sample: Arc::clone(sample),
            layout,
            phase_increment,
            time_stretch_ratio,
            length_in_frames,
            chunks: ChunkTable::new(layout.chunks_to_cover(length_in_bytes)),
            write_byte_pos: AtomicU64::new(0),
        })
    }

    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }

    pub fn phase_increment(&self) -> u32 {
        self.phase_increment
    }

    pub fn time_stretch_ratio(&self) -> u32 {
        self.time_stretch_ratio
    }

    /// Whether the cache renders the sample unchanged.
    pub fn is_unity(&self) -> bool {
        self.phase_increment == UNITY_PHASE_INCREMENT
            && self.time_stretch_ratio == UNITY_PHASE_INCREMENT
    }

    pub fn length_in_frames(&self) -> u64 {
        self.length_in_frames
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_id(&self, index: usize) -> Option<ChunkId> {
        self.chunks.get(index)
    }

    pub fn num_linked_chunks(&self) -> usize {
        self.chunks.linked_count()
    }

    /// Bytes of the cache that hold valid rendered data.
    pub fn write_byte_pos(&self) -> u64 {
        self.write_byte_pos.load(Ordering::Acquire)
    }

    /// Extend the valid region to `byte_pos`.
    pub fn advance_write_byte_pos(&self, byte_pos: u64) {
        self.write_byte_pos.fetch_max(byte_pos, Ordering::AcqRel);
    }

    /// Claim chunk `index` for writing, allocating it if needed.
    ///
    /// The pool never steals this cache's own chunks to satisfy the claim.
    pub fn write_chunk(self: &Arc<Self>, pool: &ChunkPool, index: usize) -> Option<ChunkReason> {
        if index >= self.num_chunks() {
            return None;
        }
        pool.allocate_for(
            ChunkOwner::sample_cache(self),
            index,
            Some(OwnerKey::sample_cache(self)),
        )
    }

    /// Chunk `index` has been taken by the pool.
    ///
    /// Truncates the valid region to the start of that chunk and unlinks every
    /// later chunk, which are returned.
    pub fn chunk_stolen(&self, index: usize) -> Vec<ChunkId> {
        let truncated = self.layout.chunk_start(index);
        self.write_byte_pos.fetch_min(truncated, Ordering::AcqRel);
        let dropped = self.chunks.unlink_from(index);
        tracing::debug!(
            path = %self.sample.path().display(),
            index,
            dropped = dropped.len(),
            "cache chunk stolen, truncated to {truncated} bytes"
        );
        dropped
    }

    pub(crate) fn link_chunk(&self, index: usize, id: ChunkId) -> Result<(), ChunkId> {
        self.chunks.link(index, id)
    }

    pub(crate) fn unlink_chunk(&self, index: usize, id: ChunkId) -> bool {
        self.chunks.unlink(index, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleInfo;

    fn cache(phase_increment: u32) -> Arc<SampleCache> {
        let info = SampleInfo::pcm("loop.wav", 2, 2, 44100, 44, 4 * 65536);
        let sample = Sample::new(info, ChunkLayout::new(15).unwrap()).unwrap();
        SampleCache::new(&sample, phase_increment, UNITY_PHASE_INCREMENT)
    }

    #[test]
    fn test_cache_length_follows_phase_increment() {
        let unity = cache(UNITY_PHASE_INCREMENT);
        assert!(unity.is_unity());
        assert_eq!(unity.length_in_frames(), 65536);
        assert_eq!(unity.num_chunks(), 8);

        // An octave up renders half as many frames
        let up = cache(UNITY_PHASE_INCREMENT * 2);
        assert_eq!(up.length_in_frames(), 32768);
        assert_eq!(up.num_chunks(), 4);
    }

    #[test]
    fn test_chunk_stolen_truncates_and_unlinks_later() {
        let cache = cache(UNITY_PHASE_INCREMENT);
        for i in 0..4 {
            cache.link_chunk(i, ChunkId(i as u32)).unwrap();
        }
        cache.advance_write_byte_pos(4 * 32768);

        let dropped = cache.chunk_stolen(1);
        assert_eq!(dropped, vec![ChunkId(2), ChunkId(3)]);
        assert_eq!(cache.write_byte_pos(), 32768);
        assert_eq!(cache.chunk_id(0), Some(ChunkId(0)));
        assert_eq!(cache.num_linked_chunks(), 1);

        // Losing a chunk past the valid region leaves it alone
        cache.chunk_stolen(5);
        assert_eq!(cache.write_byte_pos(), 32768);
    }
}
