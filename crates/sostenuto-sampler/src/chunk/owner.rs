//! Chunk owners.

use super::{ChunkId, StealableQueue};
use crate::cache::SampleCache;
use crate::sample::Sample;
use sostenuto_core::PlayDirection;
use std::sync::{Arc, Weak};

/// What a chunk's bytes belong to.
///
/// The owner is held weakly: a chunk never keeps its owner alive. A chunk
/// whose owner has gone is freed the next time the pool looks at it.
#[derive(Debug, Clone)]
pub enum ChunkOwner {
    /// Raw sample data as stored on disk
    Sample(Weak<Sample>),
    /// Time-stretched or repitched rendering of a sample
    SampleCache(Weak<SampleCache>),
    /// Reduced percussion-detection data for one playback direction
    PercCache {
        sample: Weak<Sample>,
        direction: PlayDirection,
    },
}

/// Kind of owner, without the back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    Sample,
    SampleCache,
    PercCacheForward,
    PercCacheReverse,
}

/// Identity of one owner table, for excluding an owner from steals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerKey {
    addr: usize,
    kind: OwnerKind,
}

impl OwnerKey {
    pub fn sample(sample: &Arc<Sample>) -> Self {
        Self {
            addr: Arc::as_ptr(sample) as *const () as usize,
            kind: OwnerKind::Sample,
        }
    }

    pub fn sample_cache(cache: &Arc<SampleCache>) -> Self {
        Self {
            addr: Arc::as_ptr(cache) as *const () as usize,
            kind: OwnerKind::SampleCache,
        }
    }

    pub fn perc_cache(sample: &Arc<Sample>, direction: PlayDirection) -> Self {
        Self {
            addr: Arc::as_ptr(sample) as *const () as usize,
            kind: perc_kind(direction),
        }
    }

    pub fn kind(&self) -> OwnerKind {
        self.kind
    }
}

fn perc_kind(direction: PlayDirection) -> OwnerKind {
    match direction {
        PlayDirection::Forward => OwnerKind::PercCacheForward,
        PlayDirection::Reverse => OwnerKind::PercCacheReverse,
    }
}

impl ChunkOwner {
    pub fn sample(sample: &Arc<Sample>) -> Self {
        Self::Sample(Arc::downgrade(sample))
    }

    pub fn sample_cache(cache: &Arc<SampleCache>) -> Self {
        Self::SampleCache(Arc::downgrade(cache))
    }

    pub fn perc_cache(sample: &Arc<Sample>, direction: PlayDirection) -> Self {
        Self::PercCache {
            sample: Arc::downgrade(sample),
            direction,
        }
    }

    pub fn kind(&self) -> OwnerKind {
        match self {
            Self::Sample(_) => OwnerKind::Sample,
            Self::SampleCache(_) => OwnerKind::SampleCache,
            Self::PercCache { direction, .. } => perc_kind(*direction),
        }
    }

    pub fn key(&self) -> OwnerKey {
        let addr = match self {
            Self::Sample(w) | Self::PercCache { sample: w, .. } => w.as_ptr() as *const () as usize,
            Self::SampleCache(w) => w.as_ptr() as *const () as usize,
        };
        OwnerKey {
            addr,
            kind: self.kind(),
        }
    }

    /// Whether the owner is still alive.
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Sample(w) | Self::PercCache { sample: w, .. } => w.strong_count() > 0,
            Self::SampleCache(w) => w.strong_count() > 0,
        }
    }

    /// Queue tier for a chunk with this owner.
    pub fn eviction_queue(&self) -> StealableQueue {
        match self {
            Self::PercCache { sample, .. } => {
                let live = sample.upgrade().is_some_and(|s| s.num_reasons() > 0);
                StealableQueue::for_perc_cache(live)
            }
            Self::SampleCache(cache) => {
                let live = cache
                    .upgrade()
                    .is_some_and(|c| c.sample().num_reasons() > 0);
                StealableQueue::for_repitched_cache(live)
            }
            Self::Sample(sample) => match sample.upgrade() {
                Some(s) => StealableQueue::for_sample_data(
                    s.num_reasons() > 0,
                    s.raw_data_format().needs_conversion(),
                ),
                None => StealableQueue::NoSongSampleData,
            },
        }
    }

    /// Chunk linked at `index` in the owner's table, if the owner is alive.
    pub(crate) fn linked_chunk(&self, index: usize) -> Option<ChunkId> {
        match self {
            Self::Sample(w) => w.upgrade()?.chunk_id(index),
            Self::SampleCache(w) => w.upgrade()?.chunk_id(index),
            Self::PercCache { sample, direction } => {
                sample.upgrade()?.perc_cache_chunk(index, *direction)
            }
        }
    }

    /// Link `id` into the owner's table. Fails with the occupant (or `id`).
    pub(crate) fn link(&self, index: usize, id: ChunkId) -> Result<(), ChunkId> {
        match self {
            Self::Sample(w) => w.upgrade().ok_or(id)?.link_chunk(index, id),
            Self::SampleCache(w) => w.upgrade().ok_or(id)?.link_chunk(index, id),
            Self::PercCache { sample, direction } => sample
                .upgrade()
                .ok_or(id)?
                .link_perc_cache_chunk(index, *direction, id),
        }
    }

    /// Remove `id` from the owner's table without notifying anyone.
    pub(crate) fn unlink(&self, index: usize, id: ChunkId) -> bool {
        match self {
            Self::Sample(w) => w.upgrade().is_some_and(|s| s.unlink_chunk(index, id)),
            Self::SampleCache(w) => w.upgrade().is_some_and(|c| c.unlink_chunk(index, id)),
            Self::PercCache { sample, direction } => sample
                .upgrade()
                .is_some_and(|s| s.unlink_perc_cache_chunk(index, *direction, id)),
        }
    }

    /// Tell the owner its chunk at `index` is being taken.
    ///
    /// Returns further chunks the owner dropped as a consequence.
    pub(crate) fn steal(&self, index: usize, id: ChunkId) -> Vec<ChunkId> {
        match self {
            Self::Sample(w) => {
                if let Some(sample) = w.upgrade() {
                    sample.chunk_stolen(index, id);
                }
                Vec::new()
            }
            Self::SampleCache(w) => w
                .upgrade()
                .map(|cache| cache.chunk_stolen(index))
                .unwrap_or_default(),
            Self::PercCache { sample, direction } => {
                if let Some(sample) = sample.upgrade() {
                    sample.perc_cache_chunk_stolen(index, *direction);
                }
                Vec::new()
            }
        }
    }
}
