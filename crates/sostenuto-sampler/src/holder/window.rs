//! Sliding window of claimed chunks.

use crate::chunk::ChunkId;
use crate::pool::{ChunkPool, ChunkReason, LoadInstruction};
use crate::sample::Sample;
use smallvec::SmallVec;
use sostenuto_core::{PlayDirection, RealtimeService};
use std::sync::Arc;
use tracing::debug;

type Slots = SmallVec<[Option<ChunkReason>; 4]>;

/// Up to `lookahead_chunks` consecutive chunks held from a playback marker on.
///
/// A slot is empty where the pool could not supply a chunk or the sample ran
/// out of audio. The window holds a reason on exactly the chunks in its slots.
#[derive(Debug, Default)]
pub struct ChunkWindow {
    slots: Slots,
}

impl ChunkWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[Option<ChunkReason>] {
        &self.slots
    }

    /// Chunk in each slot, in playback order.
    pub fn chunk_ids(&self) -> Vec<Option<ChunkId>> {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map(ChunkReason::id))
            .collect()
    }

    /// Slots currently holding a chunk.
    pub fn held(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Release every held chunk. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let held = self.held();
        self.slots.clear();
        held
    }

    /// Re-centre the window on the chunk containing `byte_offset`.
    ///
    /// Claims from that chunk onwards in `direction` until the window is full or
    /// the index leaves the sample's audio. The new window is complete before
    /// the old one is released, so chunks in both are never unheld.
    pub fn claim_for_marker(
        &mut self,
        pool: &ChunkPool,
        sample: &Arc<Sample>,
        byte_offset: u64,
        direction: PlayDirection,
        instruction: LoadInstruction,
        rt: &mut dyn RealtimeService,
    ) -> usize {
        let size = pool.config().lookahead_chunks;
        let first = sample.first_chunk_with_audio() as i64;
        let end = sample.first_chunk_with_no_audio() as i64;

        let mut fresh: Slots = (0..size).map(|_| None).collect();
        let mut index = pool.layout().chunk_index_of(byte_offset) as i64;

        for slot in fresh.iter_mut() {
            if index < first || index >= end {
                break;
            }
            *slot = pool.acquire(sample, index as usize, instruction, rt);
            match slot {
                Some(reason) if !reason.is_loaded() && instruction != LoadInstruction::DontLoad => {
                    debug!(index, chunk = reason.id().index(), "window chunk not loaded yet");
                }
                None => debug!(path = %sample.path().display(), index, "window slot left empty"),
                _ => {}
            }
            index += direction.step();
        }

        let released = self.release_all();
        self.slots = fresh;
        debug!(
            held = self.held(),
            released,
            ?direction,
            "window claimed"
        );
        self.held()
    }
}
